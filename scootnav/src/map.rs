use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{BoundingBox, Coordinate, Maneuver, PointOfInterest};

/// Commands for the map-rendering collaborator. The core never touches the
/// map widget itself; it only emits these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MapCommand {
    SetView {
        center: Coordinate,
        zoom: f64,
        animate_secs: Option<f64>,
    },
    FlyTo {
        center: Coordinate,
        zoom: f64,
        duration_secs: Option<f64>,
    },
    FitBounds {
        bounds: BoundingBox,
        padding_px: u32,
    },
    SetRotation {
        degrees: f64,
    },
    MoveUserMarker {
        position: Coordinate,
    },
    DrawRoute {
        path: Vec<Coordinate>,
    },
    ClearRoute,
    AddPoiMarkers {
        pois: Vec<PointOfInterest>,
    },
    RemovePoiMarkers {
        ids: Vec<String>,
    },
    ShowInstruction {
        maneuver: Maneuver,
    },
}

pub trait MapSink: Send + Sync {
    fn send(&self, command: MapCommand);
}

impl MapSink for broadcast::Sender<MapCommand> {
    fn send(&self, command: MapCommand) {
        // No subscriber means no map is attached; the command is simply dropped.
        if broadcast::Sender::send(self, command).is_err() {
            tracing::trace!("map command dropped, no renderer attached");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Mutex, PoisonError};

    use super::*;

    /// Collects every command for assertions.
    #[derive(Default)]
    pub struct RecordingMap {
        commands: Mutex<Vec<MapCommand>>,
    }

    impl RecordingMap {
        pub fn take(&self) -> Vec<MapCommand> {
            std::mem::take(&mut *self.commands.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    impl MapSink for RecordingMap {
        fn send(&self, command: MapCommand) {
            self.commands
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_with_tag() {
        let json = serde_json::to_value(MapCommand::SetRotation { degrees: 90.0 }).unwrap();
        assert_eq!(json["command"], "set_rotation");
        assert_eq!(json["degrees"], 90.0);
        let json = serde_json::to_value(MapCommand::ClearRoute).unwrap();
        assert_eq!(json["command"], "clear_route");
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(4);
        MapSink::send(&tx, MapCommand::ClearRoute);
        assert_eq!(rx.recv().await.unwrap(), MapCommand::ClearRoute);
    }

    #[test]
    fn broadcast_sink_without_subscribers_does_not_panic() {
        let (tx, rx) = broadcast::channel::<MapCommand>(4);
        drop(rx);
        MapSink::send(&tx, MapCommand::ClearRoute);
    }
}
