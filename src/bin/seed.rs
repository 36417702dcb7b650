use std::{collections::HashMap, env, sync::Arc};

use anyhow::Context;
use serde_json::{Value, json};
use storefront::{
    audit::AuditLogger,
    backend::{Backend, HostedBackend, Scope},
    config::AppConfig,
    hooks::RemoteTable,
    models::{Brand, Category, Product, Record},
};

const PEXELS: &str = "https://images.pexels.com/photos";

fn photo(id: u32, width: u32) -> String {
    format!("{PEXELS}/{id}/pexels-photo-{id}.jpeg?auto=compress&cs=tinysrgb&w={width}")
}

fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn category_rows() -> Vec<Value> {
    [
        ("Hair", "Premium hair care products for all hair types", 3993449),
        ("Beard", "Professional beard grooming essentials", 1319460),
        ("Skincare", "Luxurious skincare for radiant complexion", 3762879),
        ("Perfume", "Exquisite fragrances for every occasion", 1961795),
        ("Body Spray", "Refreshing body sprays for daily use", 4465124),
        ("Air Freshener", "Transform your space with luxury scents", 4210374),
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, (name, description, image))| {
        json!({
            "name": name,
            "slug": slugify(name),
            "description": description,
            "image": photo(image, 800),
            "sort_order": idx + 1,
            "active": true,
        })
    })
    .collect()
}

fn brand_rows() -> Vec<Value> {
    [
        ("Chanel", "Luxury French fashion and beauty brand", 1961795),
        ("Dior", "Premium French luxury goods company", 3762879),
        ("Tom Ford", "American luxury fashion house", 1319460),
        ("Versace", "Italian luxury fashion company", 4465124),
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, (name, description, image))| {
        json!({
            "name": name,
            "slug": slugify(name),
            "description": description,
            "image": photo(image, 400),
            "sort_order": idx + 1,
            "active": true,
        })
    })
    .collect()
}

struct SeedProduct {
    name: &'static str,
    category: &'static str,
    price: f64,
    description: &'static str,
    ingredients: &'static str,
    usage: &'static str,
    images: &'static [u32],
    stock: i32,
    featured: bool,
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Luxury Hair Serum",
        category: "Hair",
        price: 2500.0,
        description: "Premium hair serum for silky smooth hair",
        ingredients: "Argan oil, Vitamin E, Keratin proteins",
        usage: "Apply 2-3 drops to damp hair, style as usual",
        images: &[3993449, 4465124],
        stock: 25,
        featured: true,
    },
    SeedProduct {
        name: "Beard Growth Oil",
        category: "Beard",
        price: 1800.0,
        description: "Natural beard oil for healthy growth",
        ingredients: "Jojoba oil, Castor oil, Essential oils",
        usage: "Massage into beard and skin daily",
        images: &[1319460],
        stock: 30,
        featured: true,
    },
    SeedProduct {
        name: "Radiance Face Cream",
        category: "Skincare",
        price: 3200.0,
        description: "Anti-aging cream for glowing skin",
        ingredients: "Hyaluronic acid, Retinol, Vitamin C",
        usage: "Apply morning and evening to clean skin",
        images: &[3762879],
        stock: 20,
        featured: true,
    },
    SeedProduct {
        name: "Midnight Oud",
        category: "Perfume",
        price: 4500.0,
        description: "Luxurious oud fragrance for evening wear",
        ingredients: "Oud, Rose, Amber, Musk",
        usage: "Spray on pulse points",
        images: &[1961795],
        stock: 15,
        featured: true,
    },
    SeedProduct {
        name: "Fresh Citrus Body Spray",
        category: "Body Spray",
        price: 1200.0,
        description: "Refreshing citrus body spray",
        ingredients: "Citrus extracts, Natural oils",
        usage: "Spray all over body after shower",
        images: &[4465124],
        stock: 40,
        featured: false,
    },
    SeedProduct {
        name: "Lavender Room Spray",
        category: "Air Freshener",
        price: 800.0,
        description: "Calming lavender air freshener",
        ingredients: "Lavender essential oil, Natural extracts",
        usage: "Spray in room as needed",
        images: &[4210374],
        stock: 50,
        featured: false,
    },
];

fn product_rows(category_ids: &HashMap<String, String>) -> anyhow::Result<Vec<Value>> {
    PRODUCTS
        .iter()
        .map(|p| {
            let category_id = category_ids
                .get(p.category)
                .with_context(|| format!("category {} was not seeded", p.category))?;
            Ok(json!({
                "name": p.name,
                "slug": slugify(p.name),
                "category_id": category_id,
                "price": p.price,
                "description": p.description,
                "ingredients": p.ingredients,
                "usage": p.usage,
                "images": p.images.iter().map(|id| photo(*id, 800)).collect::<Vec<_>>(),
                "stock": p.stock,
                "featured": p.featured,
                "active": true,
            }))
        })
        .collect()
}

/// Inserts `rows` unless the table already has data; returns what is there
/// afterwards.
async fn seed_table<T: Record>(
    scope: &Scope,
    audit: &AuditLogger,
    rows: Vec<Value>,
) -> anyhow::Result<Vec<T>> {
    let hook = RemoteTable::<T>::for_record(scope.tables.clone())
        .audit(audit.clone())
        .build();
    hook.refetch().await?;
    let existing = hook.rows();
    if !existing.is_empty() {
        println!("{} already has {} rows, skipped", T::TABLE, existing.len());
        return Ok(existing);
    }
    let inserted = hook.bulk_insert(&rows).await?;
    println!("Seeded {} {}", inserted.len(), T::TABLE);
    Ok(inserted)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let email = env::var("SEED_ADMIN_EMAIL").context("SEED_ADMIN_EMAIL is required")?;
    let password = env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD is required")?;

    let backend: Arc<dyn Backend> = Arc::new(HostedBackend::connect(&config).await?);
    let scope = backend.anonymous();
    let session = scope.session.sign_in(&email, &password).await?;
    println!("Signed in as {}", session.actor.email);

    let audit = AuditLogger::new(scope.tables.clone(), scope.session.clone(), &config.admin_roles);

    let categories = seed_table::<Category>(&scope, &audit, category_rows()).await?;
    seed_table::<Brand>(&scope, &audit, brand_rows()).await?;

    let category_ids = categories
        .into_iter()
        .map(|c| (c.name, c.id))
        .collect::<HashMap<_, _>>();
    seed_table::<Product>(&scope, &audit, product_rows(&category_ids)?).await?;

    scope.session.sign_out().await?;
    println!("Seed completed");
    Ok(())
}
