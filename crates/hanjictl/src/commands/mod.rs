pub mod completion;
pub mod serve;
