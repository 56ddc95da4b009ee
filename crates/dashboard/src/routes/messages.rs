//! Messages screen: the shop message board.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use redline_core::UserId;

use crate::filters;
use crate::middleware::RequireUser;
use crate::models::records::Message;
use crate::permissions::{Action, allows};
use crate::state::AppState;

use super::{FlashQuery, PageContext, deny, redirect_with_error, redirect_with_notice, render_html};

/// Message view for templates.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub sender: String,
    pub body: String,
    pub sent: String,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            sender: message
                .sender_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_owned()),
            body: message.body.clone(),
            sent: message
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Messages page template.
#[derive(Template)]
#[template(path = "messages/index.html")]
pub struct MessagesTemplate {
    pub ctx: PageContext,
    pub messages: Vec<MessageView>,
    pub can_send: bool,
    pub load_error: String,
}

/// Messages page.
#[instrument(skip(user, state))]
pub async fn index(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !allows(user.role, Action::ReadMessages) {
        return Redirect::to("/").into_response();
    }

    let (messages, load_error) = match state.supabase() {
        None => (vec![], "The backend is not configured.".to_owned()),
        Some(supabase) => match supabase
            .postgrest()
            .from("messages")
            .select("id,sender_id,sender_name,body,created_at")
            .order_desc("created_at")
            .limit(100)
            .fetch::<Vec<Message>>()
            .await
        {
            Ok(rows) => (rows.iter().map(MessageView::from).collect(), String::new()),
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch messages");
                (vec![], "Could not load messages.".to_owned())
            }
        },
    };

    let template = MessagesTemplate {
        ctx: PageContext::build(&user, "/messages", &flash),
        messages,
        can_send: allows(user.role, Action::SendMessages),
        load_error,
    };
    render_html(&template).into_response()
}

#[derive(Debug, Deserialize)]
pub struct NewMessageForm {
    pub body: String,
}

#[derive(Serialize)]
struct NewMessage<'a> {
    sender_id: UserId,
    sender_name: &'a str,
    body: &'a str,
}

/// Post a message.
#[instrument(skip(user, state, form))]
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Form(form): Form<NewMessageForm>,
) -> Redirect {
    if !allows(user.role, Action::SendMessages) {
        return deny("/messages");
    }
    let body = form.body.trim();
    if body.is_empty() {
        return redirect_with_error("/messages", "The message is empty.");
    }
    let Some(supabase) = state.supabase() else {
        return redirect_with_error("/messages", "The backend is not configured.");
    };

    let new_message = NewMessage {
        sender_id: user.id,
        sender_name: &user.name,
        body,
    };
    match supabase
        .postgrest()
        .from("messages")
        .insert::<Vec<Message>>(&new_message)
        .await
    {
        Ok(_) => redirect_with_notice("/messages", "Message posted."),
        Err(err) => {
            tracing::error!(error = %err, "failed to post message");
            redirect_with_error("/messages", "Could not post the message. Try again.")
        }
    }
}
