use ethers::contract::abigen;

// Kernel v2 account. `operation` is 0 for CALL, 1 for DELEGATECALL.
abigen!(
    Kernel,
    r#"[
        function initialize(address defaultValidator, bytes data)
        function execute(address to, uint256 value, bytes data, uint8 operation) payable
    ]"#
);

abigen!(
    KernelFactory,
    r#"[
        function createAccount(address implementation, bytes data, uint256 index) payable returns (address proxy)
        function getAccountAddress(bytes data, uint256 index) view returns (address)
    ]"#
);
