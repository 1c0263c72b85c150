//! Owner broadcast
//!
//! Sends one piece of content to every chat in the user directory.
//! Chats that blocked the bot are removed from the directory.

use crate::directory::{DirectoryError, UserDirectory};
use crate::transport::{Outbound, Transport};
use tracing::{info, warn};

/// Per-broadcast delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Chats that blocked the bot and were deleted from the directory
    pub removed: Vec<i64>,
    pub failed: usize,
}

/// Fans `content` out to every known chat except the owner.
///
/// Deliveries run one after another. A blocked recipient is deleted from
/// the directory; any other failure is counted and skipped.
///
/// # Errors
///
/// Returns `DirectoryError` if the recipient list cannot be loaded.
pub async fn broadcast(
    transport: &dyn Transport,
    directory: &dyn UserDirectory,
    owner_id: i64,
    content: &Outbound,
) -> Result<BroadcastReport, DirectoryError> {
    let users = directory.list_all().await?;
    let mut report = BroadcastReport::default();

    for user in users.iter().filter(|user| user.chat_id != owner_id) {
        match transport.send(user.chat_id, content.clone()).await {
            Ok(()) => report.delivered += 1,
            Err(e) if e.is_blocked() => {
                info!(
                    chat_id = user.chat_id,
                    "Recipient blocked the bot, removing"
                );
                if let Err(e) = directory.delete_by_chat_id(user.chat_id).await {
                    warn!(chat_id = user.chat_id, error = %e, "Failed to remove blocked user");
                    report.failed += 1;
                } else {
                    report.removed.push(user.chat_id);
                }
            }
            Err(e) => {
                warn!(chat_id = user.chat_id, error = %e, "Broadcast delivery failed");
                report.failed += 1;
            }
        }
    }

    info!(
        delivered = report.delivered,
        removed = report.removed.len(),
        failed = report.failed,
        "Broadcast finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, MockUserDirectory, User};
    use crate::transport::{DeliveryError, MockTransport};
    use mockall::predicate::*;

    fn user(chat_id: i64) -> User {
        User::new(
            chat_id,
            format!("user{chat_id}"),
            Some("+998900000000".into()),
        )
    }

    #[tokio::test]
    async fn test_broadcast_skips_owner_and_removes_blocked() {
        let directory = InMemoryDirectory::with_users([user(1), user(2), user(3), user(4)]);

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(eq(2), always())
            .times(1)
            .returning(|_, _| Ok(()));
        transport
            .expect_send()
            .with(eq(3), always())
            .times(1)
            .returning(|_, _| Err(DeliveryError::Blocked));
        transport
            .expect_send()
            .with(eq(4), always())
            .times(1)
            .returning(|_, _| Err(DeliveryError::Failed("timeout".into())));
        transport.expect_send().with(eq(1), always()).never();

        let report = broadcast(&transport, &directory, 1, &Outbound::text("Aksiya!"))
            .await
            .expect("directory available");

        assert_eq!(report.delivered, 1);
        assert_eq!(report.removed, vec![3]);
        assert_eq!(report.failed, 1);
        assert!(directory
            .find_by_chat_id(3)
            .await
            .expect("lookup")
            .is_none());
        assert!(directory
            .find_by_chat_id(4)
            .await
            .expect("lookup")
            .is_some());
    }

    #[tokio::test]
    async fn test_broadcast_directory_failure() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_all()
            .returning(|| Err(DirectoryError::Backend("offline".into())));
        let transport = MockTransport::new();

        let result = broadcast(&transport, &directory, 1, &Outbound::text("x")).await;

        assert!(matches!(result, Err(DirectoryError::Backend(_))));
    }
}
