use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use settle_common::Cents;
use settlement_engine::db_types::{Address, Order, Product, UserProfile};

use crate::support::Market;

#[derive(Default, World)]
pub struct MarketWorld {
    pub market: Option<Market>,
    pub users: HashMap<String, UserProfile>,
    pub addresses: HashMap<String, Address>,
    pub products: HashMap<String, Product>,
    /// Orders keyed by the product name used in the feature file.
    pub orders: HashMap<String, Order>,
    pub payments: HashMap<String, String>,
    pub withdrawals: Vec<i64>,
    pub last_error: Option<String>,
}

impl Debug for MarketWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketWorld")
            .field("users", &self.users.keys())
            .field("products", &self.products.keys())
            .field("orders", &self.orders.keys())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl MarketWorld {
    pub fn market(&self) -> &Market {
        self.market.as_ref().expect("Marketplace not initialised")
    }

    pub fn user(&self, name: &str) -> &UserProfile {
        self.users.get(name).unwrap_or_else(|| panic!("Unknown user {name}"))
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("Unknown product {name}"))
    }

    pub fn order(&self, product: &str) -> &Order {
        self.orders.get(product).unwrap_or_else(|| panic!("No order for {product}"))
    }

    pub fn payment_id(&self, product: &str) -> String {
        self.payments.get(product).cloned().unwrap_or_else(|| panic!("No payment for {product}"))
    }

    pub fn last_withdrawal(&self) -> i64 {
        *self.withdrawals.last().expect("No withdrawal has been requested")
    }

    pub fn record<T, E: ToString>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                self.last_error = Some(e.to_string());
                None
            },
        }
    }
}

pub fn money(s: &str) -> Cents {
    s.trim_start_matches("R$").parse().unwrap_or_else(|e| panic!("{s} is not an amount. {e}"))
}
