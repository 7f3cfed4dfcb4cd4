pub use shared::{
    ApiError, BoundingBox, Coordinate, Location, Maneuver, NavigationMode, NavigationSnapshot,
    PoiKind, PointOfInterest, RoutePlan, Vehicle, VehicleKind,
};
