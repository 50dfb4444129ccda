// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread mapping queries.
//!
//! The row for a conversation is created by [`claim`] with `thread_ts` NULL.
//! Only the claimant posts the root message and fills the handle through
//! [`record_handle`], which never overwrites an existing handle. The claim's
//! `claimed_at` doubles as its token, so a holder whose claim was taken over
//! cannot [`release`] the new holder's row.

use std::time::Duration;

use chatbridge_core::{
    BridgeError, ChannelId, ClaimOutcome, ClaimToken, ConversationId, ThreadHandle, ThreadMapping,
};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::warn;

use crate::database::{Database, NOW, map_tr_err};

fn row_to_mapping(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadMapping> {
    Ok(ThreadMapping {
        conversation_id: ConversationId(row.get(0)?),
        channel_id: ChannelId(row.get(1)?),
        thread_handle: row.get::<_, Option<String>>(2)?.map(ThreadHandle),
    })
}

/// Look up the mapping for a conversation.
pub async fn get(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<Option<ThreadMapping>, BridgeError> {
    let id = conversation_id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT conversation_id, channel_id, thread_ts
                 FROM thread_mappings WHERE conversation_id = ?1",
                params![id],
                row_to_mapping,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a handle-less claim row if none exists, or take over a stale one.
pub async fn claim(
    db: &Database,
    conversation_id: &ConversationId,
    channel_id: &ChannelId,
    stale_after: Duration,
) -> Result<ClaimOutcome, BridgeError> {
    let id = conversation_id.0.clone();
    let channel = channel_id.0.clone();
    let cutoff = format!("-{} seconds", stale_after.as_secs());

    let (outcome, took_over) = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO thread_mappings
                         (conversation_id, channel_id, thread_ts, claimed_at, created_at, updated_at)
                     VALUES (?1, ?2, NULL, {NOW}, {NOW}, {NOW})"
                ),
                params![id, channel],
            )?;
            if inserted == 1 {
                let token = claimed_at(&tx, &id)?;
                tx.commit()?;
                return Ok((ClaimOutcome::Acquired(token), false));
            }

            let taken = tx.execute(
                &format!(
                    "UPDATE thread_mappings
                     SET claimed_at = {NOW}, channel_id = ?2, updated_at = {NOW}
                     WHERE conversation_id = ?1 AND thread_ts IS NULL
                       AND claimed_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3)"
                ),
                params![id, channel, cutoff],
            )?;
            if taken == 1 {
                let token = claimed_at(&tx, &id)?;
                tx.commit()?;
                return Ok((ClaimOutcome::Acquired(token), true));
            }

            let existing = tx.query_row(
                "SELECT conversation_id, channel_id, thread_ts
                 FROM thread_mappings WHERE conversation_id = ?1",
                params![id],
                row_to_mapping,
            )?;
            tx.commit()?;
            Ok((ClaimOutcome::Held(existing), false))
        })
        .await
        .map_err(map_tr_err)?;

    if took_over {
        warn!(
            conversation_id = %conversation_id,
            "took over stale thread claim"
        );
    }
    Ok(outcome)
}

fn claimed_at(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<ClaimToken> {
    conn.query_row(
        "SELECT claimed_at FROM thread_mappings WHERE conversation_id = ?1",
        params![id],
        |row| row.get::<_, String>(0).map(ClaimToken),
    )
}

/// Set the thread handle if it is still unset. Returns `false` otherwise.
pub async fn record_handle(
    db: &Database,
    conversation_id: &ConversationId,
    handle: &ThreadHandle,
) -> Result<bool, BridgeError> {
    let id = conversation_id.0.clone();
    let ts = handle.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE thread_mappings SET thread_ts = ?2, updated_at = {NOW}
                     WHERE conversation_id = ?1 AND thread_ts IS NULL"
                ),
                params![id, ts],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a claim row that never received a handle, if `token` still owns it.
pub async fn release(
    db: &Database,
    conversation_id: &ConversationId,
    token: &ClaimToken,
) -> Result<(), BridgeError> {
    let id = conversation_id.0.clone();
    let claimed_at = token.0.clone();
    let removed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM thread_mappings
                 WHERE conversation_id = ?1 AND thread_ts IS NULL AND claimed_at = ?2",
                params![id, claimed_at],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if removed == 0 {
        warn!(conversation_id = %conversation_id, "claim no longer ours, left in place");
    }
    Ok(())
}

/// Find the conversation anchored at a thread.
pub async fn find_by_thread(
    db: &Database,
    channel_id: &ChannelId,
    handle: &ThreadHandle,
) -> Result<Option<ThreadMapping>, BridgeError> {
    let channel = channel_id.0.clone();
    let ts = handle.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT conversation_id, channel_id, thread_ts
                 FROM thread_mappings WHERE channel_id = ?1 AND thread_ts = ?2",
                params![channel, ts],
                row_to_mapping,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(120);

    fn acquired(outcome: ClaimOutcome) -> ClaimToken {
        match outcome {
            ClaimOutcome::Acquired(token) => token,
            other => panic!("expected Acquired, got {other:?}"),
        }
    }

    async fn age_claim(db: &Database, conv: &ConversationId) {
        let id = conv.0.clone();
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE thread_mappings SET claimed_at = '2000-01-01T00:00:00.000Z'
                     WHERE conversation_id = ?1",
                    params![id],
                )
            })
            .await
            .unwrap();
    }

    async fn open() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("m.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn first_claim_wins_second_sees_holder() {
        let (db, _dir) = open().await;
        let conv = ConversationId::from("conv-1");
        let chan = ChannelId::from("C1");

        assert!(matches!(
            claim(&db, &conv, &chan, TTL).await.unwrap(),
            ClaimOutcome::Acquired(_)
        ));
        match claim(&db, &conv, &chan, TTL).await.unwrap() {
            ClaimOutcome::Held(m) => assert!(m.thread_handle.is_none()),
            other => panic!("expected Held, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handle_is_set_once() {
        let (db, _dir) = open().await;
        let conv = ConversationId::from("conv-2");
        claim(&db, &conv, &ChannelId::from("C1"), TTL).await.unwrap();

        assert!(record_handle(&db, &conv, &ThreadHandle::from("100.1")).await.unwrap());
        assert!(!record_handle(&db, &conv, &ThreadHandle::from("200.2")).await.unwrap());

        let mapping = get(&db, &conv).await.unwrap().unwrap();
        assert_eq!(mapping.thread_handle, Some(ThreadHandle::from("100.1")));

        let found = find_by_thread(&db, &ChannelId::from("C1"), &ThreadHandle::from("100.1"))
            .await
            .unwrap();
        assert_eq!(found.map(|m| m.conversation_id), Some(conv));
    }

    #[tokio::test]
    async fn release_only_drops_unfinished_claims() {
        let (db, _dir) = open().await;
        let pending = ConversationId::from("pending");
        let done = ConversationId::from("done");
        let chan = ChannelId::from("C1");
        let pending_token = acquired(claim(&db, &pending, &chan, TTL).await.unwrap());
        let done_token = acquired(claim(&db, &done, &chan, TTL).await.unwrap());
        record_handle(&db, &done, &ThreadHandle::from("1.0")).await.unwrap();

        release(&db, &pending, &pending_token).await.unwrap();
        release(&db, &done, &done_token).await.unwrap();

        assert!(get(&db, &pending).await.unwrap().is_none());
        assert!(get(&db, &done).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_claim_is_taken_over() {
        let (db, _dir) = open().await;
        let conv = ConversationId::from("stale");
        let chan = ChannelId::from("C1");
        claim(&db, &conv, &chan, TTL).await.unwrap();
        age_claim(&db, &conv).await;

        assert!(matches!(
            claim(&db, &conv, &chan, TTL).await.unwrap(),
            ClaimOutcome::Acquired(_)
        ));
    }

    #[tokio::test]
    async fn superseded_holder_cannot_release_new_claim() {
        let (db, _dir) = open().await;
        let conv = ConversationId::from("superseded");
        let chan = ChannelId::from("C1");
        let old = acquired(claim(&db, &conv, &chan, TTL).await.unwrap());
        age_claim(&db, &conv).await;
        let new = acquired(claim(&db, &conv, &chan, TTL).await.unwrap());
        assert_ne!(old, new);

        release(&db, &conv, &old).await.unwrap();
        match claim(&db, &conv, &chan, TTL).await.unwrap() {
            ClaimOutcome::Held(m) => assert!(m.thread_handle.is_none()),
            other => panic!("new claim should survive, got {other:?}"),
        }

        release(&db, &conv, &new).await.unwrap();
        assert!(get(&db, &conv).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completed_mapping_is_never_taken_over() {
        let (db, _dir) = open().await;
        let conv = ConversationId::from("complete");
        let chan = ChannelId::from("C1");
        claim(&db, &conv, &chan, Duration::ZERO).await.unwrap();
        record_handle(&db, &conv, &ThreadHandle::from("5.5")).await.unwrap();

        match claim(&db, &conv, &chan, Duration::ZERO).await.unwrap() {
            ClaimOutcome::Held(m) => assert_eq!(m.thread_handle, Some(ThreadHandle::from("5.5"))),
            other => panic!("expected Held, got {other:?}"),
        }
    }
}
