//! Inventory screen: stock overview and adjustments.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::InventoryItemId;

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::{InventoryItem, format_cents};
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Inventory item view for templates.
#[derive(Debug, Clone)]
pub struct InventoryView {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: String,
    pub low: bool,
}

impl From<&InventoryItem> for InventoryView {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.clone(),
            sku: item.sku.clone().unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price_cents.map(format_cents).unwrap_or_default(),
            low: item.is_low(),
        }
    }
}

/// Inventory page template.
#[derive(Template)]
#[template(path = "inventory/index.html")]
pub struct InventoryTemplate {
    pub ctx: PageContext,
    pub items: Vec<InventoryView>,
    pub can_adjust: bool,
    pub load_error: String,
}

/// Inventory overview page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadInventory) {
        return Redirect::to("/").into_response();
    }

    let (items, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("inventory_items")
            .select("id,name,sku,quantity,min_quantity,unit_price_cents")
            .order("name")
            .fetch::<Vec<InventoryItem>>()
            .await
        {
            Ok(rows) => (rows.iter().map(InventoryView::from).collect(), String::new()),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch inventory");
                (vec![], "Could not load the inventory.".to_owned())
            }
        },
    };

    let template = InventoryTemplate {
        ctx: PageContext::build(&user, "/inventory", &flash),
        items,
        can_adjust: allows(user.role, Action::AdjustInventory),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AdjustForm {
    pub item_id: InventoryItemId,
    pub quantity: i64,
}

#[derive(Serialize)]
struct SetQuantity {
    quantity: i64,
}

/// Set an item's stock level.
#[instrument(skip(user, state, form))]
pub async fn adjust(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<AdjustForm>,
) -> Redirect {
    if !allows(user.role, Action::AdjustInventory) {
        return deny("/inventory");
    }
    if form.quantity < 0 {
        return redirect_with_error("/inventory", "Stock cannot be negative.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/inventory", "The backend is not configured.");
    };

    match supabase
        .postgrest()
        .from("inventory_items")
        .eq("id", form.item_id)
        .update::<Vec<InventoryItem>>(&SetQuantity {
            quantity: form.quantity,
        })
        .await
    {
        Ok(_) => redirect_with_notice("/inventory", "Stock level updated."),
        Err(err) => {
            tracing::error!(error = %err, item_id = %form.item_id, "failed to adjust inventory");
            redirect_with_error("/inventory", "Could not update the stock level. Try again.")
        }
    }
}
