//! In-memory store for tests.
//!
//! Mirrors the `PostgreSQL` semantics the services rely on: unique public
//! ids, owner-scoped cart deletes, newest-first listings and compare-and-set
//! status updates.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use poizon_core::{CartItemId, OrderId, OrderStatus, UserId};

use super::{AddressStore, CartStore, OrderStore, RepositoryError, Store, UserStore};
use crate::models::{Address, CartItem, NewCartItem, NewOrder, NewUser, Order, User};

#[derive(Debug, Default)]
struct MemoryData {
    users: BTreeMap<UserId, User>,
    addresses: BTreeMap<UserId, Address>,
    orders: BTreeMap<OrderId, Order>,
    cart: BTreeMap<CartItemId, CartItem>,
    next_order_id: i64,
    next_cart_id: i64,
    /// Remaining inserts that fail with a public id conflict.
    forced_conflicts: u32,
    /// Milliseconds added to `Utc::now()` so records order strictly.
    clock_ticks: i64,
}

/// Store backed by in-process maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, MemoryData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` order inserts fail as public id collisions.
    pub fn force_public_id_conflicts(&self, count: u32) {
        self.data().forced_conflicts = count;
    }

    /// Backdate a user's registration.
    pub fn set_user_created_at(&self, id: UserId, created_at: DateTime<Utc>) {
        if let Some(user) = self.data().users.get_mut(&id) {
            user.created_at = created_at;
        }
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.data().orders.len()
    }
}

impl MemoryData {
    /// Strictly increasing timestamps keep newest-first ordering stable.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock_ticks += 1;
        Utc::now() + chrono::Duration::milliseconds(self.clock_ticks)
    }
}

impl UserStore for MemoryStore {
    async fn upsert_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut data = self.data();
        let now = data.tick();
        let stored = data
            .users
            .entry(user.id)
            .and_modify(|existing| {
                existing.username.clone_from(&user.username);
                existing.first_name.clone_from(&user.first_name);
            })
            .or_insert_with(|| User {
                id: user.id,
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                created_at: now,
            });
        Ok(stored.clone())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.data().users.get(&id).cloned())
    }
}

impl AddressStore for MemoryStore {
    async fn get_address(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        Ok(self.data().addresses.get(&user_id).cloned())
    }

    async fn save_address(
        &self,
        user_id: UserId,
        address: &Address,
    ) -> Result<Address, RepositoryError> {
        self.data().addresses.insert(user_id, address.clone());
        Ok(address.clone())
    }
}

impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut data = self.data();
        if data.forced_conflicts > 0 {
            data.forced_conflicts -= 1;
            return Err(RepositoryError::Conflict(
                "public id already exists".to_string(),
            ));
        }
        if data
            .orders
            .values()
            .any(|existing| existing.public_id == order.public_id)
        {
            return Err(RepositoryError::Conflict(
                "public id already exists".to_string(),
            ));
        }

        data.next_order_id += 1;
        let id = OrderId::new(data.next_order_id);
        let created_at = data.tick();
        let stored = Order {
            id,
            public_id: order.public_id.clone(),
            user_id: order.user_id,
            username: order.username.clone(),
            link: order.link.clone(),
            category: order.category.clone(),
            shipping: order.shipping,
            price: order.price,
            raw_poizon_price: order.raw_poizon_price,
            status: OrderStatus::Pending,
            delivery_type: order.delivery_type,
            city: order.city.clone(),
            street: order.street.clone(),
            full_name: order.full_name.clone(),
            phone: order.phone.clone(),
            pickup_code: order.pickup_code.clone(),
            pickup_address: order.pickup_address.clone(),
            created_at,
        };
        data.orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.data().orders.get(&id).cloned())
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .data()
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut data = self.data();
        match data.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}

impl CartStore for MemoryStore {
    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let mut items: Vec<CartItem> = self
            .data()
            .cart
            .values()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn add_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let mut data = self.data();
        data.next_cart_id += 1;
        let id = CartItemId::new(data.next_cart_id);
        let created_at = data.tick();
        let stored = CartItem {
            id,
            user_id: item.user_id,
            link: item.link.clone(),
            category: item.category.clone(),
            shipping: item.shipping,
            price: item.price,
            created_at,
        };
        data.cart.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_cart_item(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let mut data = self.data();
        if data.cart.get(&id).is_some_and(|item| item.user_id == user_id) {
            data.cart.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
