//! Customers screen.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::CustomerId;

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::Customer;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Customer view for templates.
#[derive(Debug, Clone)]
pub struct CustomerView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub disabled: bool,
}

impl From<&Customer> for CustomerView {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.to_string(),
            name: customer.full_name.clone(),
            email: customer.email.clone().unwrap_or_default(),
            phone: customer.phone.clone().unwrap_or_default(),
            disabled: customer.disabled,
        }
    }
}

/// Customers list page template.
#[derive(Template)]
#[template(path = "customers/index.html")]
pub struct CustomersIndexTemplate {
    pub ctx: PageContext,
    pub customers: Vec<CustomerView>,
    pub can_write: bool,
    pub load_error: String,
}

/// Customers list page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadCustomers) {
        return Redirect::to("/").into_response();
    }

    let (customers, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("customers")
            .select("id,full_name,email,phone,disabled,created_at")
            .order("full_name")
            .fetch::<Vec<Customer>>()
            .await
        {
            Ok(rows) => (rows.iter().map(CustomerView::from).collect(), String::new()),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch customers");
                (vec![], "Could not load customers.".to_owned())
            }
        },
    };

    let template = CustomersIndexTemplate {
        ctx: PageContext::build(&user, "/customers", &flash),
        customers,
        can_write: allows(user.role, Action::WriteCustomers),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NewCustomerForm {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
struct NewCustomer<'a> {
    full_name: &'a str,
    email: Option<&'a str>,
    phone: Option<&'a str>,
}

/// Create a customer.
#[instrument(skip(user, state, form))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<NewCustomerForm>,
) -> Redirect {
    if !allows(user.role, Action::WriteCustomers) {
        return deny("/customers");
    }
    let name = form.full_name.trim();
    if name.is_empty() {
        return redirect_with_error("/customers", "Customer name is required.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/customers", "The backend is not configured.");
    };

    let new_customer = NewCustomer {
        full_name: name,
        email: form.email.as_deref().filter(|s| !s.is_empty()),
        phone: form.phone.as_deref().filter(|s| !s.is_empty()),
    };
    match supabase
        .postgrest()
        .from("customers")
        .insert::<Vec<Customer>>(&new_customer)
        .await
    {
        Ok(_) => redirect_with_notice("/customers", "Customer added."),
        Err(err) => {
            tracing::error!(error = %err, "failed to create customer");
            redirect_with_error("/customers", "Could not add the customer. Try again.")
        }
    }
}

#[derive(Serialize)]
struct SetDisabled {
    disabled: bool,
}

/// Disable a customer.
#[instrument(skip(user, state))]
pub async fn disable(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Redirect {
    if !allows(user.role, Action::DisableCustomers) {
        return deny("/customers");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/customers", "The backend is not configured.");
    };

    match supabase
        .postgrest()
        .from("customers")
        .eq("id", id)
        .update::<Vec<Customer>>(&SetDisabled { disabled: true })
        .await
    {
        Ok(_) => redirect_with_notice("/customers", "Customer disabled."),
        Err(err) => {
            tracing::error!(error = %err, %id, "failed to disable customer");
            redirect_with_error("/customers", "Could not disable the customer. Try again.")
        }
    }
}
