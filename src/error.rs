use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Target revenue must be positive, got {0}")]
    InvalidConfiguration(f64),

    #[error("Cannot split {customers} customers into tertiles: only {distinct_values} distinct values")]
    DegenerateSegmentation {
        customers: usize,
        distinct_values: usize,
    },

    #[error("Growth rate into {month} is undefined: previous month has zero revenue")]
    UndefinedGrowthRate { month: String },
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
