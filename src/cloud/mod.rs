//! Cloud traffic-manager client abstraction (C1, spec.md §6 "Cloud
//! traffic-manager protocol" / "Cloud public-IP protocol"). An abstract
//! `reqwest`-based client against Azure Resource Manager's REST surface;
//! the cloud SDK itself (a generated client) is out of scope per spec.md
//! §1, so this models only the narrow operations the reconcilers call.

mod error;
mod profile;
mod public_ip;
mod traffic_manager;

pub use error::Error;
pub use profile::{DnsConfig, MonitorConfig, Profile, ProfileProperties, ProfileStatus};
pub use public_ip::{find_by_ingress_ip, AzureTrafficManagerPublicIpClient, PublicIpAddress, PublicIpClient};
pub use traffic_manager::{AzureTrafficManagerClient, TrafficManagerClient};

pub type Result<T, E = Error> = std::result::Result<T, E>;
