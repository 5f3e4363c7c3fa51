//! ak-aws: AWS SDK adapters for awskit
//!
//! This crate provides implementations of the ObjectStore and MessageQueue
//! traits using aws-sdk-s3 and aws-sdk-sqs. It is the only crate that
//! directly depends on the AWS SDK. The `s3` and `sqs` features select
//! which clients are built.

#[cfg(any(feature = "s3", feature = "sqs"))]
mod sdk;

#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "sqs")]
pub mod sqs;

#[cfg(feature = "s3")]
pub use s3::S3Client;
#[cfg(feature = "sqs")]
pub use sqs::SqsClient;
