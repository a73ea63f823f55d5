use alloy_sol_types::sol;

pub use alloy_sol_types::{
    SolCall,
    SolEvent,
};

/// Events emitted by the Epic Box redeemer while burning a box and minting its
/// rewards. Each carries the freshly minted token id as its only argument.
pub mod redeemer_types {
    use super::*;

    sol! {
        event PlayerMinted(uint256 playerId);
        event ScoutMinted(uint256 scoutId);
        event LandTicketTransferred(uint256 landTicketId);
    }
}

/// Mint entry points of the Epic Box collection. Polygon's collection exposes
/// `safeMint`, the other chains use `mintTo`.
pub mod box_types {
    use super::*;

    sol! {
        function safeMint(address to, string tokenURI) external;
        function mintTo(address to, string tokenURI) external;
    }
}
