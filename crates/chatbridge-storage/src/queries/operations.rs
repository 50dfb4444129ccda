// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deferred operation queries.
//!
//! State only ever moves `pending -> succeeded | failed`; every transition is
//! an `UPDATE ... WHERE state = 'pending'` so a second resolution affects no
//! rows and is reported to the caller as `false`.

use std::str::FromStr;

use chatbridge_core::{
    BridgeError, ChannelId, DeferredOperation, DeferredState, ExecutionId, ThreadContext,
    ThreadHandle,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, NOW, map_tr_err};

/// Insert a pending operation unless one with the same id exists.
pub async fn register(db: &Database, operation: &DeferredOperation) -> Result<bool, BridgeError> {
    let id = operation.execution_id.0.clone();
    let channel = operation.context.channel_id.0.clone();
    let thread = operation.context.message_ts.0.clone();
    let prompt = operation.prompt_ts.as_ref().map(|t| t.0.clone());
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO deferred_operations
                         (execution_id, channel_id, thread_ts, prompt_ts, state, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', {NOW}, {NOW})"
                ),
                params![id, channel, thread, prompt],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch an operation by execution id.
pub async fn get(
    db: &Database,
    execution_id: &ExecutionId,
) -> Result<Option<DeferredOperation>, BridgeError> {
    let id = execution_id.0.clone();
    let row = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT execution_id, channel_id, thread_ts, prompt_ts, state,
                        claimed_at IS NOT NULL, error
                 FROM deferred_operations WHERE execution_id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    row.map(|(id, channel, thread, prompt, state, claimed, error)| {
        let state = DeferredState::from_str(&state)
            .map_err(|_| BridgeError::Internal(format!("unknown operation state `{state}`")))?;
        Ok(DeferredOperation {
            execution_id: ExecutionId(id),
            context: ThreadContext {
                channel_id: ChannelId(channel),
                message_ts: ThreadHandle(thread),
            },
            prompt_ts: prompt.map(ThreadHandle),
            state,
            claimed,
            error,
        })
    })
    .transpose()
}

/// Record the message showing the operation's prompt.
pub async fn set_prompt(
    db: &Database,
    execution_id: &ExecutionId,
    prompt_ts: &ThreadHandle,
) -> Result<(), BridgeError> {
    let id = execution_id.0.clone();
    let ts = prompt_ts.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE deferred_operations SET prompt_ts = ?2, updated_at = {NOW}
                     WHERE execution_id = ?1"
                ),
                params![id, ts],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a pending, unclaimed operation as in progress.
pub async fn claim(db: &Database, execution_id: &ExecutionId) -> Result<bool, BridgeError> {
    let id = execution_id.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE deferred_operations SET claimed_at = {NOW}, updated_at = {NOW}
                     WHERE execution_id = ?1 AND state = 'pending' AND claimed_at IS NULL"
                ),
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a pending operation to a terminal state.
pub async fn resolve(
    db: &Database,
    execution_id: &ExecutionId,
    state: DeferredState,
    error: Option<&str>,
) -> Result<bool, BridgeError> {
    if !state.is_terminal() {
        return Err(BridgeError::InvalidInput(format!(
            "cannot resolve operation {execution_id} to `{state}`"
        )));
    }
    let id = execution_id.0.clone();
    let state = state.to_string();
    let error = error.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE deferred_operations SET state = ?2, error = ?3, updated_at = {NOW}
                     WHERE execution_id = ?1 AND state = 'pending'"
                ),
                params![id, state, error],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of operations still pending, for health reporting.
pub async fn count_pending(db: &Database) -> Result<i64, BridgeError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM deferred_operations WHERE state = 'pending'",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("ops.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn op(id: &str) -> DeferredOperation {
        DeferredOperation::pending(
            ExecutionId::from(id),
            ThreadContext {
                channel_id: ChannelId::from("C1"),
                message_ts: ThreadHandle::from("111.222"),
            },
        )
    }

    #[tokio::test]
    async fn register_is_insert_if_absent() {
        let (db, _dir) = open().await;
        assert!(register(&db, &op("Fx1")).await.unwrap());
        assert!(!register(&db, &op("Fx1")).await.unwrap());

        let stored = get(&db, &ExecutionId::from("Fx1")).await.unwrap().unwrap();
        assert_eq!(stored.state, DeferredState::Pending);
        assert!(!stored.claimed);
        assert_eq!(stored.context.message_ts, ThreadHandle::from("111.222"));
        assert_eq!(count_pending(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn claim_succeeds_once() {
        let (db, _dir) = open().await;
        register(&db, &op("Fx2")).await.unwrap();
        let id = ExecutionId::from("Fx2");
        assert!(claim(&db, &id).await.unwrap());
        assert!(!claim(&db, &id).await.unwrap());
        assert!(get(&db, &id).await.unwrap().unwrap().claimed);
    }

    #[tokio::test]
    async fn resolve_is_exactly_once() {
        let (db, _dir) = open().await;
        register(&db, &op("Fx3")).await.unwrap();
        let id = ExecutionId::from("Fx3");

        assert!(resolve(&db, &id, DeferredState::Failed, Some("no text")).await.unwrap());
        assert!(!resolve(&db, &id, DeferredState::Succeeded, None).await.unwrap());

        let stored = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(stored.state, DeferredState::Failed);
        assert_eq!(stored.error.as_deref(), Some("no text"));
        assert!(!claim(&db, &id).await.unwrap(), "terminal operations cannot be claimed");
    }

    #[tokio::test]
    async fn resolving_to_pending_is_rejected() {
        let (db, _dir) = open().await;
        let err = resolve(&db, &ExecutionId::from("Fx4"), DeferredState::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn prompt_ts_is_recorded() {
        let (db, _dir) = open().await;
        register(&db, &op("Fx5")).await.unwrap();
        let id = ExecutionId::from("Fx5");
        set_prompt(&db, &id, &ThreadHandle::from("333.444")).await.unwrap();
        let stored = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(stored.prompt_ts, Some(ThreadHandle::from("333.444")));
    }
}
