use debatehub_core::{
    models::{ConnectionId, RoomCode},
    repository::RoomStore,
    Error as CoreError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{MatchAction, MatchmakingRequest, MatchmakingResponse};

/// Outbound queue of one matchmaking connection
pub type MatchSender = mpsc::UnboundedSender<MatchmakingResponse>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Waiting,
    Matched(RoomCode),
}

#[derive(Debug)]
struct Waiter {
    connection_id: ConnectionId,
    sender: MatchSender,
}

/// Process-wide FIFO of anonymous connections waiting for an opponent
#[derive(Clone)]
pub struct MatchmakingQueue {
    waiting: Arc<Mutex<VecDeque<Waiter>>>,
    store: Arc<dyn RoomStore>,
    code_length: usize,
    max_code_attempts: usize,
}

impl MatchmakingQueue {
    #[must_use]
    pub fn new(store: Arc<dyn RoomStore>, code_length: usize, max_code_attempts: usize) -> Self {
        Self {
            waiting: Arc::new(Mutex::new(VecDeque::new())),
            store,
            code_length,
            max_code_attempts: max_code_attempts.max(1),
        }
    }

    /// Pair the caller with the longest-waiting connection, or queue it
    ///
    /// The matched peer is told the room code through its own sender; the
    /// caller learns it from the return value. Peers whose channel has
    /// closed are discarded and the next one is tried.
    pub async fn enqueue_or_pair(
        &self,
        connection_id: &ConnectionId,
        sender: &MatchSender,
    ) -> debatehub_core::Result<MatchOutcome> {
        loop {
            let peer = {
                let mut waiting = self.waiting.lock();
                if waiting.iter().any(|w| &w.connection_id == connection_id) {
                    return Ok(MatchOutcome::Waiting);
                }
                match waiting.pop_front() {
                    Some(peer) => peer,
                    None => {
                        waiting.push_back(Waiter {
                            connection_id: connection_id.clone(),
                            sender: sender.clone(),
                        });
                        debug!(connection_id = %connection_id, "Queued for matchmaking");
                        return Ok(MatchOutcome::Waiting);
                    }
                }
            };

            if peer.sender.is_closed() {
                debug!(connection_id = %peer.connection_id, "Discarding departed peer");
                continue;
            }

            let room_code = match self.fresh_room_code().await {
                Ok(code) => code,
                Err(e) => {
                    // Peer keeps its place at the head
                    self.waiting.lock().push_front(peer);
                    return Err(e);
                }
            };

            if peer
                .sender
                .send(MatchmakingResponse::Matched {
                    room_code: room_code.clone(),
                })
                .is_err()
            {
                debug!(connection_id = %peer.connection_id, "Peer left before match, trying next");
                continue;
            }

            info!(
                room_code = %room_code,
                first = %peer.connection_id,
                second = %connection_id,
                "Matched"
            );
            return Ok(MatchOutcome::Matched(room_code));
        }
    }

    /// Drop a connection from the queue. Returns whether it was waiting.
    pub fn remove(&self, connection_id: &ConnectionId) -> bool {
        let mut waiting = self.waiting.lock();
        let before = waiting.len();
        waiting.retain(|w| &w.connection_id != connection_id);
        before != waiting.len()
    }

    /// Answer one matchmaking request from `connection_id`
    pub async fn handle(
        &self,
        connection_id: &ConnectionId,
        sender: &MatchSender,
        request: MatchmakingRequest,
    ) -> MatchmakingResponse {
        match request.action {
            MatchAction::FindMatch => match self.enqueue_or_pair(connection_id, sender).await {
                Ok(MatchOutcome::Waiting) => MatchmakingResponse::Waiting,
                Ok(MatchOutcome::Matched(room_code)) => MatchmakingResponse::Matched { room_code },
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "Matchmaking failed");
                    MatchmakingResponse::Error {
                        message: "matchmaking unavailable, try again".to_string(),
                    }
                }
            },
            MatchAction::Cancel => {
                self.remove(connection_id);
                MatchmakingResponse::Cancelled
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.waiting.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting.lock().is_empty()
    }

    async fn fresh_room_code(&self) -> debatehub_core::Result<RoomCode> {
        for _ in 0..self.max_code_attempts {
            let code = RoomCode::generate(self.code_length);
            if !self.store.room_exists(&code).await? {
                return Ok(code);
            }
            debug!(room_code = %code, "Generated room code already taken");
        }
        Err(CoreError::Internal(format!(
            "no free room code after {} attempts",
            self.max_code_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debatehub_core::repository::MemoryRoomStore;

    fn queue() -> MatchmakingQueue {
        MatchmakingQueue::new(Arc::new(MemoryRoomStore::new()), 6, 5)
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from_string(id.to_string())
    }

    #[tokio::test]
    async fn test_first_waits_second_pairs() {
        let queue = queue();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert_eq!(
            queue.enqueue_or_pair(&conn("q1"), &tx1).await.unwrap(),
            MatchOutcome::Waiting
        );
        let MatchOutcome::Matched(code) = queue.enqueue_or_pair(&conn("q2"), &tx2).await.unwrap()
        else {
            panic!("expected a match");
        };

        assert_eq!(code.as_str().len(), 6);
        assert_eq!(
            rx1.try_recv().unwrap(),
            MatchmakingResponse::Matched { room_code: code }
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_find_match_keeps_one_entry() {
        let queue = queue();
        let (tx, _rx) = mpsc::unbounded_channel();
        queue.enqueue_or_pair(&conn("q1"), &tx).await.unwrap();
        assert_eq!(
            queue.enqueue_or_pair(&conn("q1"), &tx).await.unwrap(),
            MatchOutcome::Waiting
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_departed_peer_is_skipped() {
        let queue = queue();
        let (tx_gone, rx_gone) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, _rx_c) = mpsc::unbounded_channel();

        queue.enqueue_or_pair(&conn("gone"), &tx_gone).await.unwrap();
        drop(rx_gone);
        assert_eq!(
            queue.enqueue_or_pair(&conn("b"), &tx_b).await.unwrap(),
            MatchOutcome::Waiting
        );

        let outcome = queue.enqueue_or_pair(&conn("c"), &tx_c).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::Matched(_)));
        assert!(matches!(rx_b.try_recv(), Ok(MatchmakingResponse::Matched { .. })));
    }

    #[tokio::test]
    async fn test_cancel_and_remove() {
        let queue = queue();
        let (tx, _rx) = mpsc::unbounded_channel();
        queue.enqueue_or_pair(&conn("q1"), &tx).await.unwrap();

        let response = queue
            .handle(
                &conn("q1"),
                &tx,
                MatchmakingRequest {
                    action: MatchAction::Cancel,
                },
            )
            .await;
        assert_eq!(response, MatchmakingResponse::Cancelled);
        assert!(queue.is_empty());
        assert!(!queue.remove(&conn("q1")));
    }
}
