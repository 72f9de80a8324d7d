//! Demo: three actors editing one in-memory canvas.
//!
//! Run with `RUST_LOG=debug cargo run` to see every write and broadcast.

use std::sync::Arc;
use std::time::Duration;

use canvas::doc::Shape;
use canvas::engine::Phase;
use canvas_sync::adapters::{MemoryChannel, MemoryStore};
use canvas_sync::config::SessionConfig;
use canvas_sync::error::{ErrorCode, SessionError};
use canvas_sync::session::Session;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Board {
    store: MemoryStore,
    previews: MemoryChannel,
    cursors: MemoryChannel,
    config: SessionConfig,
}

impl Board {
    async fn join(&self, actor: &str) -> Session {
        let mut session = Session::new(
            actor,
            Arc::new(self.store.clone()),
            Arc::new(self.previews.connect_client()),
            Arc::new(self.cursors.connect_client()),
            self.config.clone(),
        );
        session.start().await;
        session.settle().await;
        session
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SessionError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let board = Board {
        store: MemoryStore::with_owner("alice", "Demo board"),
        previews: MemoryChannel::new(),
        cursors: MemoryChannel::new(),
        config: SessionConfig::from_env(),
    };
    let tick = Duration::from_millis(board.config.tick_ms);

    let mut alice = board.join("alice").await;
    let mut bob = board.join("bob").await;

    // Alice draws, changes her mind about the circle, then restores it.
    let note = alice.request_create(Shape::rectangle("", 40.0, 40.0, 160.0, 100.0));
    let dot = alice.request_create(Shape::circle("", 400.0, 120.0, 30.0));
    alice.settle().await;
    alice.undo();
    alice.settle().await;
    info!(dot_present = board.store.shape(&dot).is_some(), "alice undid the circle");
    alice.redo();
    alice.settle().await;
    bob.pump();
    info!(shapes = bob.shapes().len(), "bob sees alice's shapes");

    // Bob grabs the rectangle and drags it with a shaky hand.
    bob.select(vec![note.clone()], false);
    bob.settle().await;
    let mut rng = rand::rng();
    let (mut x, mut y) = (40.0, 40.0);
    for _ in 0..10 {
        x += 12.0 + rng.random_range(-2.0..2.0);
        y += 4.0 + rng.random_range(-2.0..2.0);
        bob.request_move(&note, x, y, Phase::Preview)?;
        bob.pointer_moved(x + 10.0, y + 10.0);
        tokio::time::sleep(tick).await;
        bob.tick();
    }
    bob.settle().await;
    alice.pump();
    info!(
        preview_x = alice.shape(&note).map_or(0.0, |s| s.x),
        stored_x = board.store.shape(&note).map_or(0.0, |s| s.x),
        cursors = alice.cursors().len(),
        "alice sees bob's live preview"
    );
    bob.request_move(&note, x, y, Phase::Commit)?;
    bob.settle().await;

    // Carol arrives and tries to grab the same shape.
    let mut carol = board.join("carol").await;
    if let Err(e) = carol.request_move(&note, 0.0, 0.0, Phase::Commit) {
        info!(code = e.error_code(), retryable = e.retryable(), "carol refused: {e}");
    }
    for notice in carol.take_notices() {
        info!(code = notice.code, "notice for carol: {}", notice.message);
    }

    // The owner removes bob, which releases bob's lock.
    alice.pump();
    alice.kick("bob")?;
    alice.settle().await;
    carol.pump();
    info!(
        locked_by = ?board.store.shape(&note).and_then(|s| s.locked_by),
        carol_can_edit = carol.can_edit(&note),
        online = carol.online_users().len(),
        "bob removed"
    );

    carol.shutdown().await;
    bob.shutdown().await;
    alice.shutdown().await;
    Ok(())
}
