//! Static product catalog.
//!
//! The catalog is immutable for the process lifetime. Prices are in so'm.

use serde::{Deserialize, Serialize};

/// Placeholder product image used by the built-in catalog
const PRODUCT_IMAGE_URL: &str =
    "https://img.freepik.com/free-photo/delicious-burger-with-fresh-ingredients_23-2150857908.jpg";

/// A single orderable product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Menu section the item belongs to
    pub category: String,
    /// Display name, unique across the catalog
    pub name: String,
    /// Unit price in so'm
    pub price: u64,
    /// Image shown on the product card
    pub image_url: String,
    /// Short description shown on the product card
    pub description: String,
}

impl CatalogItem {
    fn new(category: &str, name: &str, price: u64, description: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            price,
            image_url: PRODUCT_IMAGE_URL.to_string(),
            description: description.to_string(),
        }
    }
}

/// Ordered collection of catalog items
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Creates a catalog from items; category order follows first appearance.
    #[must_use]
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// The menu served by the bot.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            CatalogItem::new("Ichimliklar", "Cola 1L", 12_000, "Yangi va sovuq cola."),
            CatalogItem::new("Ichimliklar", "Fanta 1L", 11_000, "Apelsinli ichimlik."),
            CatalogItem::new(
                "Ichimliklar",
                "Sprite 1L",
                11_500,
                "Limon va Laymli gazli ichimlik.",
            ),
            CatalogItem::new("Yeguliklar", "Burger", 25_000, "Go'shtli va mazali burger."),
            CatalogItem::new("Yeguliklar", "Lavash", 20_000, "Mazali va to'yimli lavash."),
            CatalogItem::new("Yeguliklar", "Hot Dog", 15_000, "Klassik hot dog."),
            CatalogItem::new("Shirinliklar", "Tort", 18_000, "Shokoladli tort."),
            CatalogItem::new("Shirinliklar", "Donut", 9_000, "Shirin va yumshoq donut."),
            CatalogItem::new(
                "Shirinliklar",
                "Chizkeyk",
                22_000,
                "Yengil va mazali chizkeyk.",
            ),
        ])
    }

    /// Category names in menu order, without duplicates.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for item in &self.items {
            if !categories.contains(&item.category.as_str()) {
                categories.push(&item.category);
            }
        }
        categories
    }

    /// Returns `true` if `text` names a category exactly.
    #[must_use]
    pub fn is_category(&self, text: &str) -> bool {
        self.items.iter().any(|item| item.category == text)
    }

    /// Items of a category in catalog order.
    #[must_use]
    pub fn items_in(&self, category: &str) -> Vec<&CatalogItem> {
        self.items
            .iter()
            .filter(|item| item.category == category)
            .collect()
    }

    /// Looks up an item by its display name.
    #[must_use]
    pub fn find_item(&self, name: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.name == name)
    }
}
