//! Order model shared by the cache, the store adapter and the HTTP surface.
//!
//! `Order` is the canonical shape as it arrives from the event source and as
//! it is persisted. `OrderView` is the flattened public shape returned by the
//! lookup endpoint; converting between the two is a presentation concern and
//! lives here rather than in the cache.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Opaque 64-bit order identifier, assigned by the store when an order is
/// first persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl OrderId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(v: i64) -> Self {
        OrderId(v)
    }
}

impl FromStr for OrderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(OrderId)
    }
}

// ---------------------------------------------------------------------------
// Order (canonical)
// ---------------------------------------------------------------------------

/// Immutable order record. Once stored it is never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Monetary amounts are integer minor units as delivered upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// UTC epoch seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

// ---------------------------------------------------------------------------
// OrderView (public)
// ---------------------------------------------------------------------------

/// Public lookup response. Internal identifiers (uids, shard keys, signatures,
/// transaction ids) are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub track_number: String,
    pub delivery_service: String,
    pub date_created: DateTime<Utc>,
    pub delivery: DeliveryView,
    pub payment: PaymentView,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryView {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentView {
    pub currency: String,
    pub provider: String,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub name: String,
    pub brand: String,
    pub size: String,
    pub price: i64,
    pub sale: i64,
    pub total_price: i64,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        OrderView {
            track_number: o.track_number.clone(),
            delivery_service: o.delivery_service.clone(),
            date_created: o.date_created,
            delivery: DeliveryView {
                name: o.delivery.name.clone(),
                phone: o.delivery.phone.clone(),
                zip: o.delivery.zip.clone(),
                city: o.delivery.city.clone(),
                address: o.delivery.address.clone(),
                region: o.delivery.region.clone(),
                email: o.delivery.email.clone(),
            },
            payment: PaymentView {
                currency: o.payment.currency.clone(),
                provider: o.payment.provider.clone(),
                bank: o.payment.bank.clone(),
                delivery_cost: o.payment.delivery_cost,
                goods_total: o.payment.goods_total,
                custom_fee: o.payment.custom_fee,
            },
            items: o
                .items
                .iter()
                .map(|it| ItemView {
                    name: it.name.clone(),
                    brand: it.brand.clone(),
                    size: it.size.clone(),
                    price: it.price,
                    sale: it.sale,
                    total_price: it.total_price,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "order_uid": "b563feb7b2b84b6test",
      "track_number": "WBILMTESTTRACK",
      "entry": "WBIL",
      "delivery": {
        "name": "Test Testov",
        "phone": "+9720000000",
        "zip": "2639809",
        "city": "Kiryat Mozkin",
        "address": "Ploshad Mira 15",
        "region": "Kraiot",
        "email": "test@gmail.com"
      },
      "payment": {
        "transaction": "b563feb7b2b84b6test",
        "request_id": "",
        "currency": "USD",
        "provider": "wbpay",
        "amount": 1817,
        "payment_dt": 1637907727,
        "bank": "alpha",
        "delivery_cost": 1500,
        "goods_total": 317,
        "custom_fee": 0
      },
      "items": [
        {
          "chrt_id": 9934930,
          "track_number": "WBILMTESTTRACK",
          "price": 453,
          "rid": "ab4219087a764ae0btest",
          "name": "Mascaras",
          "sale": 30,
          "size": "0",
          "total_price": 317,
          "nm_id": 2389212,
          "brand": "Vivienne Sabo",
          "status": 202
        }
      ],
      "locale": "en",
      "internal_signature": "",
      "customer_id": "test",
      "delivery_service": "meest",
      "shardkey": "9",
      "sm_id": 99,
      "date_created": "2021-11-26T06:22:19Z",
      "oof_shard": "1"
    }"#;

    #[test]
    fn sample_payload_decodes() {
        let o: Order = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(o.track_number, "WBILMTESTTRACK");
        assert_eq!(o.items.len(), 1);
        assert_eq!(o.payment.goods_total, 317);
    }

    #[test]
    fn view_flattens_and_drops_internal_fields() {
        let o: Order = serde_json::from_str(SAMPLE).unwrap();
        let v = OrderView::from(&o);
        assert_eq!(v.delivery_service, "meest");
        assert_eq!(v.items[0].brand, "Vivienne Sabo");
        assert_eq!(v.items[0].total_price, 317);

        let json = serde_json::to_value(&v).unwrap();
        assert!(json.get("order_uid").is_none());
        assert!(json.get("shardkey").is_none());
        assert!(json["payment"].get("transaction").is_none());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut v: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        v.as_object_mut().unwrap().remove("track_number");
        assert!(serde_json::from_value::<Order>(v).is_err());
    }

    #[test]
    fn order_id_parses_and_displays() {
        let id: OrderId = " 42 ".parse().unwrap();
        assert_eq!(id, OrderId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<OrderId>().is_err());
    }
}
