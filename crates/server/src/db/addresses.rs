//! Saved address repository.

use sqlx::PgPool;

use poizon_core::{DeliveryType, UserId};

use super::RepositoryError;
use crate::models::Address;

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    name: String,
    phone: String,
    city: String,
    city_code: Option<String>,
    street: Option<String>,
    delivery_type: String,
    pickup_code: Option<String>,
    pickup_address: Option<String>,
}

impl TryFrom<AddressRow> for Address {
    type Error = RepositoryError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        let delivery_type = row
            .delivery_type
            .parse::<DeliveryType>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            name: row.name,
            phone: row.phone,
            city: row.city,
            city_code: row.city_code,
            street: row.street,
            delivery_type,
            pickup_code: row.pickup_code,
            pickup_address: row.pickup_address,
        })
    }
}

/// Repository for the one-per-user delivery address.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's saved address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored delivery type is invalid.
    pub async fn get(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT name, phone, city, city_code, street, delivery_type,
                   pickup_code, pickup_address
            FROM user_address
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Address::try_from).transpose()
    }

    /// Overwrite every field of the user's address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        address: &Address,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            INSERT INTO user_address (
                user_id, name, phone, city, city_code, street,
                delivery_type, pickup_code, pickup_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE
            SET name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                city = EXCLUDED.city,
                city_code = EXCLUDED.city_code,
                street = EXCLUDED.street,
                delivery_type = EXCLUDED.delivery_type,
                pickup_code = EXCLUDED.pickup_code,
                pickup_address = EXCLUDED.pickup_address,
                updated_at = NOW()
            RETURNING name, phone, city, city_code, street, delivery_type,
                      pickup_code, pickup_address
            ",
        )
        .bind(user_id)
        .bind(&address.name)
        .bind(&address.phone)
        .bind(&address.city)
        .bind(&address.city_code)
        .bind(&address.street)
        .bind(address.delivery_type.as_str())
        .bind(&address.pickup_code)
        .bind(&address.pickup_address)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }
}
