//! Support ticket queries.
//!
//! Lifecycle invariants enforced here, not in handlers: one active ticket
//! per user, admin replies mark ANSWERED, user replies re-OPEN, CLOSED is
//! terminal, and deletion removes messages in the same transaction.

use perch_core::db::{DatabaseError, unix_timestamp};

use super::db::Database;
use super::models::{Ticket, TicketMessage, TicketStatus};

impl Database {
    /// The caller's OPEN or ANSWERED ticket, if any.
    pub async fn active_ticket_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Ticket>, DatabaseError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE user_id = ? AND status != 'CLOSED' ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(ticket)
    }

    /// Create a ticket with its first message in one transaction.
    ///
    /// Rejects when the user already has an active ticket.
    pub async fn create_ticket(
        &self,
        user_id: &str,
        subject: &str,
        content: &str,
    ) -> Result<Ticket, DatabaseError> {
        if self.active_ticket_for_user(user_id).await?.is_some() {
            return Err(DatabaseError::Query(
                "You already have an open ticket".into(),
            ));
        }

        let now = unix_timestamp();
        let ticket_id = uuid::Uuid::new_v4().to_string();
        let message_id = uuid::Uuid::new_v4().to_string();

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO tickets (id, user_id, subject, status, created_at, updated_at) \
             VALUES (?, ?, ?, 'OPEN', ?, ?)",
        )
        .bind(&ticket_id)
        .bind(user_id)
        .bind(subject)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO ticket_messages (id, ticket_id, user_id, content, is_admin, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&message_id)
        .bind(&ticket_id)
        .bind(user_id)
        .bind(content)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_ticket(&ticket_id).await
    }

    pub async fn get_ticket(&self, id: &str) -> Result<Ticket, DatabaseError> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Ticket {id}")))
    }

    pub async fn list_tickets_for_user(&self, user_id: &str) -> Result<Vec<Ticket>, DatabaseError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(tickets)
    }

    pub async fn list_all_tickets(&self) -> Result<Vec<Ticket>, DatabaseError> {
        let tickets = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(tickets)
    }

    pub async fn list_ticket_messages(
        &self,
        ticket_id: &str,
    ) -> Result<Vec<TicketMessage>, DatabaseError> {
        let messages = sqlx::query_as::<_, TicketMessage>(
            "SELECT * FROM ticket_messages WHERE ticket_id = ? ORDER BY created_at",
        )
        .bind(ticket_id)
        .fetch_all(self.pool())
        .await?;
        Ok(messages)
    }

    /// Append a message and advance the ticket status in one transaction.
    ///
    /// Admin replies mark the ticket ANSWERED; user replies re-open it.
    /// CLOSED tickets reject new messages.
    pub async fn post_ticket_message(
        &self,
        ticket_id: &str,
        user_id: &str,
        content: &str,
        is_admin: bool,
    ) -> Result<TicketMessage, DatabaseError> {
        let ticket = self.get_ticket(ticket_id).await?;
        if ticket.status == TicketStatus::Closed {
            return Err(DatabaseError::Query("Ticket is closed".into()));
        }

        let now = unix_timestamp();
        let message_id = uuid::Uuid::new_v4().to_string();
        let next_status = if is_admin {
            TicketStatus::Answered
        } else {
            TicketStatus::Open
        };

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO ticket_messages (id, ticket_id, user_id, content, is_admin, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message_id)
        .bind(ticket_id)
        .bind(user_id)
        .bind(content)
        .bind(is_admin)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?")
            .bind(next_status)
            .bind(now)
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        sqlx::query_as::<_, TicketMessage>("SELECT * FROM ticket_messages WHERE id = ?")
            .bind(&message_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Ticket message {message_id}")))
    }

    /// Admin status override (e.g. closing a ticket).
    pub async fn set_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> Result<Ticket, DatabaseError> {
        sqlx::query("UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(unix_timestamp())
            .bind(ticket_id)
            .execute(self.pool())
            .await?;

        self.get_ticket(ticket_id).await
    }

    /// Delete a ticket and its messages; messages go first so no orphan
    /// rows survive a partial failure.
    pub async fn delete_ticket(&self, ticket_id: &str) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM ticket_messages WHERE ticket_id = ?")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
