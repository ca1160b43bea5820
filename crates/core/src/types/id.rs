//! Numeric row and account identifiers.
//!
//! Orders, cart lines and customers are all addressed by bare integers on the
//! wire and in Postgres. Each gets its own wrapper so an order id can never be
//! passed where a Telegram user id is expected. Every id is `i64`: Telegram
//! user ids outgrow `i32`, and our tables use `BIGSERIAL` keys.
//!
//! Customer-facing order numbers are a different thing, see
//! [`PublicId`](crate::PublicId).

/// Declare an `i64`-backed identifier.
///
/// Attributes (including doc comments) written before the name are applied
/// to the generated struct. The wrapper is `Copy`, orders and hashes like
/// the integer, and serializes as a plain number. With the `postgres`
/// feature it binds and decodes as `BIGINT`.
///
/// ```rust
/// # use poizon_core::define_id;
/// define_id!(
///     /// A parcel handed to the carrier.
///     ParcelId
/// );
///
/// let parcel = ParcelId::new(901);
/// assert_eq!(i64::from(parcel), 901);
/// assert_eq!("901".parse::<ParcelId>().ok(), Some(parcel));
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i64 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i64 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                <i64 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::core::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i64 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(
    /// Telegram account id, taken from verified `initData`. We never mint these.
    UserId
);
define_id!(
    /// `orders.id`. Internal; customers see the order's `PublicId`.
    OrderId
);
define_id!(
    /// `cart_items.id`.
    CartItemId
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_holds_telegram_sized_values() {
        let id = UserId::new(7_123_456_789);
        assert_eq!(id.as_i64(), 7_123_456_789);
        assert_eq!(id.to_string(), "7123456789");
    }

    #[test]
    fn test_order_id_is_a_bare_number_in_json() {
        let id = OrderId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<OrderId>("42").unwrap(), id);
        assert!(serde_json::from_str::<OrderId>("\"42\"").is_err());
    }

    #[test]
    fn test_parse_from_path_segment() {
        assert_eq!("17".parse::<OrderId>().unwrap(), OrderId::new(17));
        assert_eq!(" 5 ".parse::<CartItemId>().unwrap(), CartItemId::new(5));
        assert!("abc".parse::<OrderId>().is_err());
        assert!("".parse::<OrderId>().is_err());
    }
}
