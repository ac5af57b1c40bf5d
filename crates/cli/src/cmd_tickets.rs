//! `helpdesk tickets`: list tickets, optionally filtered.

use helpdesk_protocol::Role;
use helpdesk_sync::{SyncConfig, TicketFilter};

use crate::output::Output;
use crate::session::Connected;

pub async fn run(config: &SyncConfig, out: &Output, filter: TicketFilter) -> anyhow::Result<()> {
    let session = Connected::rest_only(config);
    session.handle.load_tickets().await?;

    let tickets = session.handle.filtered(&filter);
    out.tickets(&tickets)?;
    if !out.is_json() {
        let snapshot = session.handle.snapshot();
        out.note(&format!(
            "{} of {} tickets, {} unread for admin",
            tickets.len(),
            snapshot.tickets.len(),
            snapshot.total_unread(Role::Admin)
        ));
    }

    session.shutdown().await;
    Ok(())
}
