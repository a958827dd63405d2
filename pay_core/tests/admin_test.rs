// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::{Address, B256, U256};
use pay_core::{
    manager::{context::memory::InMemoryContext, Manager},
    Error, LedgerConfig,
};
use pay_message::RelayPayload;
use pay_order::LedgerEvent;
use rstest::*;

#[fixture]
fn config() -> LedgerConfig {
    LedgerConfig {
        owner: Address::repeat_byte(0x0a),
        custody: Address::repeat_byte(0x0c),
        protocol_fee_recipient: Address::repeat_byte(0x0f),
        trusted_relayer: Address::repeat_byte(0x0b),
        settlement_chain: 6,
    }
}

#[fixture]
fn stranger() -> Address {
    Address::repeat_byte(0x66)
}

#[fixture]
fn context() -> InMemoryContext {
    InMemoryContext::default()
}

#[fixture]
fn manager(config: LedgerConfig, context: InMemoryContext) -> Manager<InMemoryContext> {
    Manager::new(config, context).unwrap()
}

#[rstest]
fn invalid_config_is_rejected(mut config: LedgerConfig, context: InMemoryContext) {
    config.custody = Address::ZERO;
    assert!(matches!(
        Manager::new(config, context),
        Err(Error::InvalidConfig { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn non_owner_is_rejected_everywhere(manager: Manager<InMemoryContext>, stranger: Address) {
    let unauthorized = |result: Result<(), Error>| {
        matches!(result, Err(Error::Unauthorized { caller }) if caller == stranger)
    };
    assert!(unauthorized(manager.pause(stranger).await));
    assert!(unauthorized(manager.unpause(stranger).await));
    assert!(unauthorized(
        manager.set_protocol_fee_recipient(stranger, stranger).await
    ));
    assert!(unauthorized(manager.set_trusted_relayer(stranger, stranger).await));
    assert!(unauthorized(manager.transfer_ownership(stranger, stranger).await));
    assert!(unauthorized(manager.emergency_withdraw(stranger, stranger, 1).await));
    assert!(!manager.is_paused().await);

    // invalid arguments from a stranger are still an authorization failure
    assert!(unauthorized(
        manager.set_protocol_fee_recipient(stranger, Address::ZERO).await
    ));
    assert!(unauthorized(manager.transfer_ownership(stranger, Address::ZERO).await));
    assert!(unauthorized(manager.emergency_withdraw(stranger, Address::ZERO, 0).await));
}

#[rstest]
#[tokio::test]
async fn pause_blocks_mutations_but_not_views(
    config: LedgerConfig,
    context: InMemoryContext,
    stranger: Address,
) {
    let manager = Manager::new(config.clone(), context.clone()).unwrap();
    let order_id = B256::repeat_byte(1);
    manager
        .create_order(order_id, stranger, 10, 0)
        .await
        .unwrap();

    manager.pause(config.owner).await.unwrap();
    assert!(manager.is_paused().await);

    assert!(matches!(
        manager
            .create_order(B256::repeat_byte(2), stranger, 10, 0)
            .await,
        Err(Error::Paused)
    ));
    assert!(matches!(
        manager.contribute_directly(order_id, 1, stranger).await,
        Err(Error::Paused)
    ));
    let payload = RelayPayload {
        order_id,
        amount: U256::from(1),
        source_chain: 1,
    }
    .encode();
    assert!(matches!(
        manager
            .handle_relayed_message(config.trusted_relayer, 1, B256::ZERO, payload, true)
            .await,
        Err(Error::Paused)
    ));
    assert_eq!(manager.get_order(order_id).await.unwrap().total_amount, 10);

    manager.unpause(config.owner).await.unwrap();
    context.mint(stranger, 1).unwrap();
    context.approve(stranger, config.custody, 1).unwrap();
    assert!(manager.contribute_directly(order_id, 1, stranger).await.is_ok());

    let events = context.published_events().unwrap();
    assert!(events.contains(&LedgerEvent::Paused { by: config.owner }));
    assert!(events.contains(&LedgerEvent::Unpaused { by: config.owner }));
}

#[rstest]
#[tokio::test]
async fn fee_recipient_change_applies_to_next_settlement(
    config: LedgerConfig,
    context: InMemoryContext,
) {
    let manager = Manager::new(config.clone(), context.clone()).unwrap();
    let recipient = Address::repeat_byte(0xfe);
    assert!(matches!(
        manager
            .set_protocol_fee_recipient(config.owner, Address::ZERO)
            .await,
        Err(Error::InvalidConfig { .. })
    ));
    manager
        .set_protocol_fee_recipient(config.owner, recipient)
        .await
        .unwrap();
    assert_eq!(manager.config().await.protocol_fee_recipient, recipient);

    let payer = Address::repeat_byte(0x99);
    let merchant = Address::repeat_byte(0x98);
    context.mint(payer, 1_000_000).unwrap();
    context.approve(payer, config.custody, 1_000_000).unwrap();
    let order_id = B256::repeat_byte(3);
    manager
        .create_order(order_id, merchant, 1_000_000, 0)
        .await
        .unwrap();
    manager
        .contribute_directly(order_id, 1_000_000, payer)
        .await
        .unwrap();

    assert_eq!(context.balance(recipient).unwrap(), 50_000);
    assert_eq!(context.balance(config.protocol_fee_recipient).unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn relayer_and_owner_can_be_replaced(config: LedgerConfig, stranger: Address) {
    let context = InMemoryContext::default();
    let manager = Manager::new(config.clone(), context.clone()).unwrap();
    let order_id = B256::repeat_byte(4);
    manager
        .create_order(order_id, stranger, 10, 0)
        .await
        .unwrap();
    let payload = RelayPayload {
        order_id,
        amount: U256::from(5),
        source_chain: 1,
    }
    .encode();

    manager
        .set_trusted_relayer(config.owner, stranger)
        .await
        .unwrap();
    assert!(matches!(
        manager
            .handle_relayed_message(config.trusted_relayer, 1, B256::ZERO, payload.clone(), true)
            .await,
        Err(Error::Unauthorized { .. })
    ));
    assert!(manager
        .handle_relayed_message(stranger, 1, B256::ZERO, payload, true)
        .await
        .is_ok());

    manager
        .transfer_ownership(config.owner, stranger)
        .await
        .unwrap();
    assert!(matches!(
        manager.pause(config.owner).await,
        Err(Error::Unauthorized { .. })
    ));
    manager.pause(stranger).await.unwrap();

    assert!(context
        .published_events()
        .unwrap()
        .contains(&LedgerEvent::OwnershipTransferred {
            previous: config.owner,
            current: stranger,
        }));
}

#[rstest]
#[tokio::test]
async fn cleared_relayer_disables_relay_path(config: LedgerConfig, manager: Manager<InMemoryContext>) {
    manager
        .set_trusted_relayer(config.owner, Address::ZERO)
        .await
        .unwrap();
    let result = manager
        .handle_relayed_message(Address::ZERO, 1, B256::ZERO, vec![0u8; 96].into(), true)
        .await;
    assert!(matches!(result, Err(Error::Unauthorized { .. })));
}

#[rstest]
#[tokio::test]
async fn emergency_withdraw_moves_custody_funds(
    config: LedgerConfig,
    context: InMemoryContext,
    stranger: Address,
) {
    let manager = Manager::new(config.clone(), context.clone()).unwrap();
    context.mint(config.custody, 500).unwrap();

    assert!(matches!(
        manager.emergency_withdraw(config.owner, stranger, 501).await,
        Err(Error::InsufficientFunds { available: 500, .. })
    ));

    manager.pause(config.owner).await.unwrap();
    manager
        .emergency_withdraw(config.owner, stranger, 200)
        .await
        .unwrap();
    assert_eq!(context.balance(stranger).unwrap(), 200);
    assert_eq!(context.balance(config.custody).unwrap(), 300);
    assert!(context
        .published_events()
        .unwrap()
        .contains(&LedgerEvent::EmergencyWithdrawal {
            to: stranger,
            amount: 200,
        }));
}
