//! Azure Government provider for sentinel-connector
//!
//! - Session: `az` CLI sign-in and bearer tokens ([`AzCliSessionProvider`])
//! - Management: ARM + Microsoft Graph REST via reqwest ([`AzureManagementClient`])

pub mod arm;
pub mod az;
pub mod client;
pub mod error;
pub mod graph;
pub mod rest;
pub mod session;

pub use az::{AzCli, LoginMethod};
pub use client::{AzureManagementClient, RetryConfig};
pub use error::{AzureError, Result};
pub use session::{AzCliSessionProvider, SignInAction, plan_sign_in};
