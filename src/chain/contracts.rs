//! ABI bindings for the agent token and NFT collection.

use alloy::sol;

sol! {
    /// ERC-2612 permit message.
    #[derive(Debug, PartialEq, Eq)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}

sol! {
    #[sol(rpc)]
    interface IAgentCoin {
        function name() external view returns (string);
        function nonces(address owner) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function permit(address owner, address spender, uint256 value, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IAgentNFTs {
        function mintAgentNFTsCollection(address to, string tokenURI, string title) external;
        function balanceOf(address owner) external view returns (uint256);
    }
}
