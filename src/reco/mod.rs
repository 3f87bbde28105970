//! Recommendation board domain: types, transport and the optimistic client.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod coordinator;
pub mod mutation;
pub mod projector;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::ItemCollection;
pub use cached_client::RecoClient;
pub use client::GraphQlTransport;
pub use coordinator::{MutationCommand, MutationCoordinator, MutationOutcome};
pub use mutation::{MutationHandle, MutationState};
pub use transport::{Operation, Payload, Transport};
pub use types::{Media, NewRecommendation, RecoId, RecommendationItem, UserId};
