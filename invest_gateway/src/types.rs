use alloy_sol_types::sol;
use serde::Deserialize;

pub type DerivationPath = Vec<Vec<u8>>;

/// JSON-RPC response envelope of raw `request` calls
#[derive(Deserialize, Debug)]
pub struct EthCallResponse {
    pub id: u64,
    pub jsonrpc: String,
    pub result: String,
}

sol!(
    // Platform types
    struct InvestmentRound {
        uint256 roundId;
        string roundName;
        uint256 tokenPrice;
        uint256 rewardPercentage;
        uint256 totalTokenOpenInvestment;
        uint256 tokensSold;
        uint256 closeDateInvestment;
        uint256 endDateInvestment;
        bool isActive;
        uint8 status;
    }

    struct InvestmentRoundNFT {
        uint256 tokenId;
        uint256 roundId;
        uint256 tokenPrice;
        uint256 rewardPercentage;
        uint256 purchaseTimestamp;
        address originalBuyer;
        bool redeemed;
        bool rewardClaimed;
        bool transferLocked;
    }

    struct InvestorDetail {
        uint256 totalInvestment;
        uint256 totalTokens;
        uint256 totalRewardClaimed;
        uint256[] roundIds;
    }

    // Core getters
    function totalRoundsCreated() external view returns (uint256);
    function getInvestmentRound(uint256 _roundId) external view returns (InvestmentRound memory);
    function getInvestorDetail(address _investor) external view returns (InvestorDetail memory);

    // ERC20 (USDT) and ERC721 (round NFT) getters
    function balanceOf(address _owner) external view returns (uint256);
    function allowance(address _owner, address _spender) external view returns (uint256);
    function tokenOfOwnerByIndex(address _owner, uint256 _index) external view returns (uint256);
    function getTokenInfo(uint256 _tokenId) external view returns (InvestmentRoundNFT memory);

    // Investor externals
    function approve(address _spender, uint256 _amount) external returns (bool);
    function investInRound(uint256 _roundId, uint256 _tokenAmount) external;
    function claimReward(uint256 _tokenId) external;
    function redeemToken(uint256 _tokenId) external;

    // Admin externals
    function createInvestmentRound(
        string _roundName,
        uint256 _tokenPrice,
        uint256 _rewardPercentage,
        uint256 _totalTokenOpenInvestment,
        uint256 _closeDateInvestment,
        uint256 _endDateInvestment
    ) external returns (uint256);
    function mint(address _to, uint256 _amount) external;
    function withdrawRoundFunds(uint256 _roundId) external;
);

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use alloy_sol_types::SolCall;

    #[test]
    fn invest_calldata_starts_with_selector() {
        let call = investInRoundCall {
            _roundId: U256::from(7),
            _tokenAmount: U256::from(3),
        };
        let data = call.abi_encode();
        assert_eq!(&data[..4], &investInRoundCall::SELECTOR);
        assert_eq!(data.len(), 4 + 32 * 2);
    }

    #[test]
    fn approve_selector_matches_erc20() {
        // keccak256("approve(address,uint256)")[..4]
        assert_eq!(approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        let call = approveCall {
            _spender: Address::repeat_byte(0x11),
            _amount: U256::from(1),
        };
        assert_eq!(call.abi_encode().len(), 68);
    }

    #[test]
    fn balance_of_selector_matches_erc20() {
        // keccak256("balanceOf(address)")[..4]
        assert_eq!(balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
    }
}
