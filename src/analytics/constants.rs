use std::time::Duration;

/// Action reported for state-change events that do not configure one.
pub const DEFAULT_STATE_CHANGE_ACTION: &str = "stateChange";

/// Marker for a path segment that matches any key.
pub const WILDCARD_SEGMENT: &str = "%";

/// Accepted values for the `transport` event field.
pub const TRANSPORT_VALUES: [&str; 3] = ["beacon", "xhr", "image"];

pub const MODAL_PATH_PREFIX: &str = "/modal/";

pub const DEFAULT_TRACKER_NAME: &str = "t0";

/// Tracker creation argument used when no `gaOptions` object is given.
pub const AUTO_COOKIE_DOMAIN: &str = "auto";

pub const DIMENSION_PREFIX: &str = "dimension";
pub const METRIC_PREFIX: &str = "metric";

pub const REDACTED_EMAIL: &str = "REDACTED (Potential Email Address)";

/// Delay between model initialization and the `userId` state lookup.
pub const USER_ID_RESOLVE_DELAY: Duration = Duration::from_millis(2);
