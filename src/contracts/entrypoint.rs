use ethers::contract::abigen;

// EntryPoint v0.6, only the nonce getter. The userOp hash is computed locally.
abigen!(
    EntryPoint,
    r#"[
        function getNonce(address sender, uint192 key) view returns (uint256 nonce)
    ]"#
);
