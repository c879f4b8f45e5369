// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Level};

use crate::player::PlaybackController;
use crate::wheel::{angle_from, hit_region, sector_at, Point, WedgePath, WheelPosition};

pub mod keyboard;

/// Controller events that will trigger behavior in the player.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// A tap on the given sector. Stops the current sequence and plays the sector's asset.
    Tap(WheelPosition),

    /// A tap at a point on the wheel canvas. Taps outside every sector are ignored.
    TapAt(Point),

    /// Replays the armed sequence from the start.
    Play,

    /// Stops the current sequence. If nothing is playing, does nothing.
    Stop,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// One tap-sensitive sector.
pub struct TapTarget {
    pub position: WheelPosition,
    pub region: WedgePath,
}

/// The 24 tap targets of a wheel laid out on a canvas of the given size.
pub struct TapTable {
    center: Point,
    targets: Vec<TapTarget>,
}

impl TapTable {
    pub fn new(wheel_size: f64) -> TapTable {
        let targets = WheelPosition::all()
            .map(|position| TapTarget {
                position,
                region: hit_region(position.index(), position.ring(), wheel_size),
            })
            .collect();
        TapTable {
            center: Point::new(wheel_size / 2.0, wheel_size / 2.0),
            targets,
        }
    }

    /// Finds the sector under the point. The angle picks one sector index, then the
    /// radius picks the ring. Later targets sit on top, so the inner ring wins where
    /// the bands overlap.
    pub fn locate(&self, point: Point) -> Option<WheelPosition> {
        let index = sector_at(angle_from(self.center, point));
        self.targets
            .iter()
            .rev()
            .filter(|target| target.position.index() == index)
            .find(|target| target.region.within_radii(point))
            .map(|target| target.position)
    }

    pub fn targets(&self) -> &[TapTarget] {
        &self.targets
    }
}

/// Turns events into playback controller calls.
pub struct Dispatcher {
    player: PlaybackController,
    table: TapTable,
}

impl Dispatcher {
    pub fn new(player: PlaybackController, wheel_size: f64) -> Dispatcher {
        Dispatcher {
            player,
            table: TapTable::new(wheel_size),
        }
    }

    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    pub fn handle(&mut self, event: Event) {
        let position = match event {
            Event::Tap(position) => position,
            Event::TapAt(point) => match self.table.locate(point) {
                Some(position) => position,
                None => {
                    debug!(x = point.x, y = point.y, "Tap missed the wheel.");
                    return;
                }
            },
            Event::Play => return self.player.play(),
            Event::Stop => return self.player.stop(),
        };

        info!(
            position = position.to_string(),
            asset = position.asset(),
            "Sector tapped."
        );
        self.player.stop();
        self.player.load_and_play(position.asset());
    }
}

/// Feeds driver events to a dispatcher.
pub struct Controller {
    handle: JoinHandle<Dispatcher>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(dispatcher: Dispatcher, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(
                async move { Controller::trigger_events(dispatcher, driver).await },
            ),
        }
    }

    /// Join will block until the driver runs out of events, and hands back the dispatcher.
    pub async fn join(&mut self) -> Result<Dispatcher, JoinError> {
        (&mut self.handle).await
    }

    /// Triggers player events by watching the driver and getting events from it.
    async fn trigger_events(mut dispatcher: Dispatcher, driver: Arc<dyn Driver>) -> Dispatcher {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            state = dispatcher.player().state().to_string(),
            sequence = dispatcher.player().current_sequence(),
            "Controller started."
        );

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");
            // Stopping joins the sequencer thread, so keep it off the async workers.
            tokio::task::block_in_place(|| dispatcher.handle(event));
        }

        info!("Controller closing.");
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
        dispatcher
    }
}
