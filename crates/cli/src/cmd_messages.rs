//! `helpdesk messages`, `helpdesk reply` and `helpdesk status`.

use helpdesk_protocol::{MessageQuery, TicketStatus};
use helpdesk_sync::SyncConfig;

use crate::output::Output;
use crate::session::Connected;

pub async fn show(
    config: &SyncConfig,
    out: &Output,
    ticket_id: &str,
    query: MessageQuery,
) -> anyhow::Result<()> {
    let session = Connected::rest_only(config);
    session.handle.open_ticket(ticket_id, query).await?;

    let snapshot = session.handle.snapshot();
    out.messages(ticket_id, &snapshot.messages)?;

    session.shutdown().await;
    Ok(())
}

pub async fn reply(
    config: &SyncConfig,
    out: &Output,
    ticket_id: &str,
    text: &str,
) -> anyhow::Result<()> {
    // Without the channel the reply is still stored, just not broadcast.
    let session = match Connected::live(config).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(
                component = "cli",
                event = "cli.reply.channel_unavailable",
                error = %e,
                "Replying without broadcast"
            );
            out.warn(&format!("event channel unavailable ({e:#}), reply will not be broadcast"));
            Connected::rest_only(config)
        }
    };

    // Knowing the ticket lets the session fill in the end user's id.
    session.handle.load_tickets().await?;
    session
        .handle
        .open_ticket(ticket_id, MessageQuery::default())
        .await?;
    let message = session.handle.send_message(text).await?;
    out.sent(ticket_id, &message, session.is_live())?;

    session.shutdown().await;
    Ok(())
}

pub async fn set_status(
    config: &SyncConfig,
    out: &Output,
    ticket_id: &str,
    status: TicketStatus,
) -> anyhow::Result<()> {
    let session = Connected::rest_only(config);
    session.handle.load_tickets().await?;
    session.handle.update_status(ticket_id, status).await?;

    match session.handle.snapshot().ticket(ticket_id) {
        Some(ticket) => out.tickets(std::slice::from_ref(ticket))?,
        None => out.note(&format!("{ticket_id} is now {status}")),
    }

    session.shutdown().await;
    Ok(())
}
