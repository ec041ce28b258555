//! Solidity interface definitions for the backing token contracts.

use alloy_sol_types::sol;

sol! {
    /// The ERC-20 subset used to read balances and send payments.
    ///
    /// Both Polygon USDC contracts expose this surface with identical
    /// decimals.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}
