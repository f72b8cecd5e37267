pub mod socrata;

pub use socrata::SocrataClient;
