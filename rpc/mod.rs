// ============================================================================
// RPC Module - Node Communication & Relayer Envelopes
// ============================================================================
//
// Everything that crosses the wire to the blockchain node.
//
// Components:
//   - chain_client: ChainClient trait + JSON-RPC implementation
//   - envelope: EIP-155 legacy envelope signed by the relayer key
//
// ============================================================================

pub mod chain_client;
pub mod envelope;

pub use chain_client::*;
pub use envelope::*;
