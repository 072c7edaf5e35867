/// Markers and field names of the inline annotation block.
/// These strings are the persisted format; later passes re-parse them verbatim.
pub const METADATA_OPEN: &str = "[EVENT_METADATA]";
pub const METADATA_CLOSE: &str = "[/EVENT_METADATA]";

pub const EVENT_URL_FIELD: &str = "Event_URL";
pub const BOOKING_URL_FIELD: &str = "Booking_URL";
pub const EVENT_DATE_FIELD: &str = "Event_Date";
pub const EVENT_TIME_FIELD: &str = "Event_Time";
pub const NOTE_FIELD: &str = "Note";

/// Placeholder written when no URL is known
pub const URL_NOT_AVAILABLE: &str = "URL_NOT_AVAILABLE";

pub const UNMATCHED_NOTE: &str = "This event does not have an associated web page";

// Ticket listing line prefixes
pub const EVENT_PAGE_PREFIX: &str = "Event Page:";
pub const TICKETING_PREFIX: &str = "Ticketing:";

/// Page separators left behind by the PDF-to-text dump
pub const PAGE_MARKER: &str = "--- Page";

// Festival URL shapes
pub const EVENT_PATH_PREFIX: &str = "/en/show/";
pub const BOOKING_PATH: &str = "/selection/event/seat";
pub const PERF_ID_PARAM: &str = "perfId";
pub const PRODUCT_ID_PARAM: &str = "productId";

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "SCHEDULE_LINKER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "schedule_linker.toml";
