pub(crate) mod console;
pub(crate) mod logger;
pub(crate) mod styles;
