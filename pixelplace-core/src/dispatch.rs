//! Partitioned command delivery.
//!
//! Pixel commands are routed by the tile they fall in, so placements in one
//! region serialize through a single worker while different regions proceed
//! in parallel. Each worker runs commands on the blocking pool one at a time.

use crate::engine::CanvasEngine;
use crate::error::{CanvasError, Result};
use crate::tile::TileRouter;
use pixelplace_types::{CanvasCreated, Coord, CreateCanvas, PixelPlaced, PlacePixel};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

const QUEUE_DEPTH: usize = 1024;

/// A command accepted by the dispatcher.
#[derive(Debug, Clone)]
pub enum Command {
    CreateCanvas(CreateCanvas),
    PlacePixel(PlacePixel),
}

/// Result of a successfully handled command.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    CanvasCreated(CanvasCreated),
    PixelPlaced(PixelPlaced),
}

struct Job {
    command: Command,
    reply: oneshot::Sender<Result<CommandOutcome>>,
}

pub struct CommandDispatcher {
    router: TileRouter,
    senders: Vec<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl CommandDispatcher {
    /// Start `partitions` workers on the current runtime.
    pub fn spawn(engine: Arc<CanvasEngine>, router: TileRouter, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        let mut senders = Vec::with_capacity(partitions);
        let mut workers = Vec::with_capacity(partitions);

        for partition in 0..partitions {
            let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(partition, engine.clone(), rx)));
        }

        Self {
            router,
            senders,
            workers,
        }
    }

    pub fn partitions(&self) -> usize {
        self.senders.len()
    }

    /// Worker that handles `command`.
    pub fn partition_of(&self, command: &Command) -> usize {
        match command {
            Command::CreateCanvas(_) => 0,
            Command::PlacePixel(place) => {
                // Negative input is rejected by the engine; any worker will do.
                let x = u32::try_from(place.x).unwrap_or(0);
                let y = u32::try_from(place.y).unwrap_or(0);
                let key = self.router.tile_key(&place.canvas_id, Coord::new(x, y));
                self.router.partition_for(&key, self.senders.len())
            }
        }
    }

    pub async fn submit(&self, command: Command) -> Result<CommandOutcome> {
        let partition = self.partition_of(&command);
        let (reply, response) = oneshot::channel();
        self.senders[partition]
            .send(Job { command, reply })
            .await
            .map_err(|_| CanvasError::Persistence("command dispatcher is shut down".into()))?;
        response
            .await
            .map_err(|_| CanvasError::Persistence("command worker dropped the reply".into()))?
    }

    pub async fn create_canvas(&self, command: CreateCanvas) -> Result<CanvasCreated> {
        match self.submit(Command::CreateCanvas(command)).await? {
            CommandOutcome::CanvasCreated(created) => Ok(created),
            CommandOutcome::PixelPlaced(_) => Err(mismatched_outcome()),
        }
    }

    pub async fn place_pixel(&self, command: PlacePixel) -> Result<PixelPlaced> {
        match self.submit(Command::PlacePixel(command)).await? {
            CommandOutcome::PixelPlaced(placed) => Ok(placed),
            CommandOutcome::CanvasCreated(_) => Err(mismatched_outcome()),
        }
    }

    /// Stop accepting commands and wait for queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.senders);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Command worker terminated abnormally");
            }
        }
    }
}

fn mismatched_outcome() -> CanvasError {
    CanvasError::Persistence("command worker returned a mismatched outcome".into())
}

async fn run_worker(partition: usize, engine: Arc<CanvasEngine>, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        let engine = engine.clone();
        let command = job.command;
        let outcome = tokio::task::spawn_blocking(move || execute(&engine, command))
            .await
            .unwrap_or_else(|e| {
                Err(CanvasError::Persistence(format!(
                    "command panicked on partition {partition}: {e}"
                )))
            });
        if job.reply.send(outcome).is_err() {
            debug!(partition, "Caller went away before the reply");
        }
    }
    debug!(partition, "Command worker stopped");
}

fn execute(engine: &CanvasEngine, command: Command) -> Result<CommandOutcome> {
    match command {
        Command::CreateCanvas(create) => engine
            .create_canvas(create)
            .map(CommandOutcome::CanvasCreated),
        Command::PlacePixel(place) => engine.place_pixel(place).map(CommandOutcome::PixelPlaced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::eventlog::MemoryEventLog;
    use pixelplace_types::CanvasId;

    fn dispatcher() -> CommandDispatcher {
        let engine = Arc::new(CanvasEngine::new(
            Arc::new(MemoryEventLog::new()),
            &Config::default(),
        ));
        CommandDispatcher::spawn(engine, TileRouter::new(100), 4)
    }

    #[tokio::test]
    async fn test_same_tile_same_partition() {
        let dispatcher = dispatcher();
        let a = Command::PlacePixel(PlacePixel::new("c", 101, 205, "#000", "u"));
        let b = Command::PlacePixel(PlacePixel::new("c", 199, 299, "#000", "u"));
        assert_eq!(dispatcher.partition_of(&a), dispatcher.partition_of(&b));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_round_trip_through_workers() {
        let dispatcher = dispatcher();
        let created = dispatcher
            .create_canvas(CreateCanvas {
                canvas_id: Some(CanvasId::new("d")),
                name: "d".into(),
                width: 300,
                height: 300,
                background_color: "#000".into(),
                created_by: "admin".into(),
            })
            .await
            .unwrap();
        assert_eq!(created.canvas_id.as_str(), "d");

        let mut handles = Vec::new();
        let dispatcher = Arc::new(dispatcher);
        for i in 0..40i64 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                dispatcher
                    .place_pixel(PlacePixel::new("d", i * 7, i * 3, "#fff", "u1"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let err = dispatcher
            .place_pixel(PlacePixel::new("d", -1, 0, "#fff", "u1"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
