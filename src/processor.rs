use solana_program::{msg, pubkey::Pubkey};

use crate::error::FarmError;
use crate::instruction::Instruction;
use crate::protocol::Protocol;

/// Decode `data` and run it against `target` on behalf of `caller`.
pub fn process_instruction(
    protocol: &mut Protocol,
    caller: &Pubkey,
    target: &Pubkey,
    data: &[u8],
) -> Result<(), FarmError> {
    let instruction = Instruction::unpack(data)?;
    dispatch(protocol, caller, target, instruction)
}

/// Component an instruction is addressed to.
fn expected_target(protocol: &Protocol, instruction: &Instruction) -> Pubkey {
    let config = protocol.config();
    match instruction {
        Instruction::GrantRole { .. }
        | Instruction::RevokeRole { .. }
        | Instruction::RenounceRole { .. } => config.access_manager,
        Instruction::CreateFarm { .. } | Instruction::UpgradeFarms { .. } => config.farm_factory,
        Instruction::UpdateMinDelay { .. } => config.governor,
        _ => config.asset_router,
    }
}

pub fn dispatch(
    protocol: &mut Protocol,
    caller: &Pubkey,
    target: &Pubkey,
    instruction: Instruction,
) -> Result<(), FarmError> {
    if *target != expected_target(protocol, &instruction) {
        msg!("Error: instruction tag {} not handled by {}", instruction.tag(), target);
        return Err(FarmError::UnknownTarget);
    }

    match instruction {
        Instruction::GrantRole { role, account } => {
            protocol.grant_role(caller, role, &account)?;
        }
        Instruction::RevokeRole { role, account } => {
            protocol.revoke_role(caller, role, &account)?;
        }
        Instruction::RenounceRole { role } => {
            protocol.renounce_role(caller, role)?;
        }
        Instruction::CreateFarm { pool } => {
            protocol.create_farm(caller, &pool)?;
        }
        Instruction::UpgradeFarms { implementation } => {
            protocol.upgrade_farms(caller, &implementation)?;
        }
        Instruction::Deposit { pool, amount, recipient } => {
            protocol.deposit(caller, &pool, amount, &recipient)?;
        }
        Instruction::DepositTokens { pool, amounts, min_lp, recipient } => {
            protocol.deposit_tokens(caller, &pool, &amounts, min_lp, &recipient)?;
        }
        Instruction::DepositWithSwap { pool, input_mint, routes, recipient } => {
            protocol.deposit_with_swap(caller, &pool, &input_mint, &routes, &recipient)?;
        }
        Instruction::DepositSingleAsset { pool, input_mint, amount, routes, min_lp, recipient } => {
            protocol.deposit_single_asset(
                caller, &pool, &input_mint, amount, &routes, min_lp, &recipient,
            )?;
        }
        Instruction::Withdraw { pool, shares, recipient } => {
            protocol.withdraw(caller, &pool, shares, &recipient)?;
        }
        Instruction::WithdrawTokens { pool, shares, min_amounts, recipient } => {
            protocol.withdraw_tokens(caller, &pool, shares, &min_amounts, &recipient)?;
        }
        Instruction::WithdrawWithSwap { pool, shares, target_mint, routes, recipient } => {
            protocol.withdraw_with_swap(caller, &pool, shares, &target_mint, &routes, &recipient)?;
        }
        Instruction::WithdrawSingleAsset { pool, shares, target_mint, routes, recipient } => {
            protocol.withdraw_single_asset(caller, &pool, shares, &target_mint, &routes, &recipient)?;
        }
        Instruction::WithdrawSingleEth { pool, shares, routes, recipient } => {
            protocol.withdraw_single_eth(caller, &pool, shares, &routes, &recipient)?;
        }
        Instruction::Distribute { pool, routes, fee } => {
            protocol.distribute(caller, &pool, &routes, &fee)?;
        }
        Instruction::Pause => protocol.pause(caller)?,
        Instruction::Unpause => protocol.unpause(caller)?,
        Instruction::SetDepositCap { pool, cap } => {
            protocol.set_deposit_cap(caller, &pool, cap)?;
        }
        Instruction::UpgradeRouter { implementation } => {
            protocol.upgrade_router(caller, &implementation)?;
        }
        Instruction::UpdateMinDelay { delay } => {
            protocol.update_min_delay(caller, delay)?;
        }
    }
    Ok(())
}
