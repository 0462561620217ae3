use std::sync::Arc;

use serde_json::{Number, Value};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{
    backend::ShopSource,
    data::{CURRENCY_NAME, SHOP_COMMENT_KEY, SHOP_LINES_PER_SECTION, ShopItem, ShopRotation, UNKNOWN},
    embed::{Embed, Tone},
    lifecycle::IntegrationContext,
    webhook::Delivery,
};

/// Splits a raw shop document into featured and daily items. Entries
/// without a `meta` object are skipped.
pub fn adapt(raw: &Value) -> ShopRotation {
    let mut rotation = ShopRotation::default();
    let Some(entries) = raw.as_object() else {
        return rotation;
    };

    for (key, value) in entries {
        if key == SHOP_COMMENT_KEY {
            continue;
        }
        let section = if key.starts_with("featured") {
            &mut rotation.featured
        } else if key.starts_with("daily") {
            &mut rotation.daily
        } else {
            continue;
        };
        let Some(meta) = value.get("meta").and_then(Value::as_object) else {
            continue;
        };

        let text = |field: &str| {
            meta.get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        section.push(ShopItem {
            name: text("name").unwrap_or_else(|| UNKNOWN.to_owned()),
            dev_name: key.clone(),
            price: match value.get("price") {
                Some(Value::Number(price)) => price.clone(),
                _ => Number::from(0),
            },
            rarity: text("rarity").unwrap_or_else(|| UNKNOWN.to_owned()),
            item_type: text("type").unwrap_or_else(|| UNKNOWN.to_owned()),
            image: text("image"),
        });
    }
    rotation
}

/// Zero renders as `?`; whole floats drop their fraction.
fn price_label(price: &Number) -> String {
    let value = price.as_f64().unwrap_or(0.0);
    if value == 0.0 || value.is_nan() {
        return "?".to_owned();
    }
    match price.as_i64() {
        Some(whole) => whole.to_string(),
        None if value.fract() == 0.0 && value.abs() < 1e15 => (value as i64).to_string(),
        None => price.to_string(),
    }
}

fn section_lines(items: &[ShopItem]) -> String {
    items
        .iter()
        .take(SHOP_LINES_PER_SECTION)
        .map(|item| {
            let name = [item.name.as_str(), item.dev_name.as_str()]
                .into_iter()
                .find(|n| !n.is_empty())
                .unwrap_or(UNKNOWN);
            format!("• {name} - {} {CURRENCY_NAME}", price_label(&item.price))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn rotation_embed(ctx: &IntegrationContext, rotation: &ShopRotation) -> Embed {
    let mut embed = ctx
        .embeds
        .create("Shop Rotation Update", Tone::ShopRotation)
        .description("The item shop has been updated with new items!");
    if !rotation.featured.is_empty() {
        embed = embed.field("Featured Items", section_lines(&rotation.featured), false);
    }
    if !rotation.daily.is_empty() {
        embed = embed.field("Daily Items", section_lines(&rotation.daily), false);
    }
    if let Some(image) = rotation.featured.iter().find_map(|item| item.image.clone()) {
        embed = embed.thumbnail(image);
    }
    embed
}

/// Posts the rotation summary. Delivery failures are logged, not returned.
pub async fn notify_rotation(ctx: &IntegrationContext, rotation: &ShopRotation) {
    let channel = &ctx.config.webhooks.shop_rotation;
    if !ctx.config.enabled || !channel.is_configured() {
        return;
    }
    match ctx.notifier.notify(channel, &rotation_embed(ctx, rotation)).await {
        Ok(Delivery::Sent(_)) => info!("Shop rotation webhook sent"),
        Ok(Delivery::Skipped) => {}
        Err(e) => error!("Failed to send shop webhook: {}", e),
    }
}

/// Reacts to completed rotations until the source is dropped.
pub fn spawn_rotation_listener(ctx: Arc<IntegrationContext>, shop: Arc<dyn ShopSource>) -> JoinHandle<()> {
    let mut rotations = shop.subscribe_rotations();
    info!("Shop rotation hook installed");
    tokio::spawn(async move {
        loop {
            match rotations.recv().await {
                Ok(_) => match shop.get_shop_data().await {
                    Ok(Some(raw)) => notify_rotation(&ctx, &adapt(&raw)).await,
                    Ok(None) => {}
                    Err(e) => error!("Shop hook error: {}", e),
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!("Shop hook skipped {} rotation events", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
