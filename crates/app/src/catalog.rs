use axum::Json;
use serde::Serialize;

/// A storefront catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Unit price in major currency units.
    pub price: f64,
}

/// The storefront catalog. Product data ships with the binary; there is no
/// catalog database behind it.
pub const PRODUCTS: &[Product] = &[
    Product {
        id: "classic-bbq",
        name: "Classic BBQ Rub",
        description: "Brown sugar and smoked paprika, the house standard.",
        price: 11.99,
    },
    Product {
        id: "coffee-chili",
        name: "Coffee Chili Rub",
        description: "Dark roast coffee and ancho chili, made for brisket.",
        price: 13.49,
    },
    Product {
        id: "citrus-herb",
        name: "Citrus Herb Rub",
        description: "Lemon peel, rosemary and thyme for poultry.",
        price: 10.99,
    },
    Product {
        id: "smokehouse-sampler",
        name: "Smokehouse Sampler",
        description: "All three rubs in two-ounce tins.",
        price: 29.99,
    },
];

pub async fn list_products() -> Json<&'static [Product]> {
    Json(PRODUCTS)
}
