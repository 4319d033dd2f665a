use ethers::contract::abigen;

// Weighted ECDSA validator plugin. Guardians form a linked list per account,
// starting at `weightedStorage(account).firstGuardian`.
abigen!(
    WeightedEcdsaValidatorContract,
    r#"[
        function weightedStorage(address kernel) view returns (uint24 totalWeight, uint24 threshold, uint48 delay, address firstGuardian)
        function guardian(address guardian, address kernel) view returns (uint24 weight, address nextGuardian)
        function renew(address[] guardians, uint24[] weights, uint24 threshold, uint48 delay)
    ]"#
);
