mod categorized_data;
mod category_pattern;
mod usage_log;

pub use categorized_data::CategorizedData;
pub use category_pattern::CategoryPattern;
pub use usage_log::UsageLog;
