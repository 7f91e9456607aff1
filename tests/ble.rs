mod common;

use boardlink::channel::command::LedAction;
use boardlink::channel::evaluator::LinkEvent;
use boardlink::channel::queue::SubmitOutcome;
use boardlink::channel::registry::MAX_CENTRALS;
use boardlink::channel::session::Dispatch;
use boardlink::channel::{ExecutionResult, QueuePolicy, Session, TransportKind};
use boardlink::config::ChannelConfig;
use boardlink::transport::ble::{BleEvent, BlePeripheral};
use common::{Call, MockAdvertiser, RecordingBoard};

const COMMAND_HANDLE: u16 = 0x002A;
const SENTINEL: &[u8] = b"_EOT_";

fn setup(config: ChannelConfig) -> (Session<RecordingBoard>, BlePeripheral<MockAdvertiser>) {
    let mut session = common::session_with(config);
    let peripheral = BlePeripheral::new(MockAdvertiser::default(), COMMAND_HANDLE, &mut session);
    (session, peripheral)
}

fn write<'a>(conn_handle: u16, data: &'a [u8]) -> BleEvent<'a> {
    BleEvent::GattsWrite {
        conn_handle,
        value_handle: COMMAND_HANDLE,
        data,
    }
}

/// Send `chunks` followed by the sentinel; return the dispatch of the sentinel.
fn send_command(
    session: &mut Session<RecordingBoard>,
    peripheral: &mut BlePeripheral<MockAdvertiser>,
    conn_handle: u16,
    chunks: &[&[u8]],
) -> Option<Dispatch> {
    for chunk in chunks {
        assert_eq!(peripheral.handle_event(session, write(conn_handle, chunk)), None);
    }
    peripheral.handle_event(session, write(conn_handle, SENTINEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_advertising() {
        let (session, peripheral) = setup(ChannelConfig::default());
        assert_eq!(
            peripheral.advertiser().adverts,
            vec![("BitDogLab Pico2W".to_string(), 100_000)]
        );
        assert!(session.registry().is_advertising());
    }

    #[test]
    fn test_advertising_failure_is_not_fatal() {
        let mut session = common::session();
        let advertiser = MockAdvertiser {
            fail: true,
            ..Default::default()
        };
        let _peripheral = BlePeripheral::new(advertiser, COMMAND_HANDLE, &mut session);
        assert!(!session.registry().is_advertising());
    }

    #[test]
    fn test_chunked_command_is_queued_then_executed() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });
        assert!(!session.registry().is_advertising());

        let dispatch = send_command(&mut session, &mut peripheral, 1, &[b"led.", b"on()"]);
        assert_eq!(dispatch, Some(Dispatch::Queued(SubmitOutcome::Accepted)));
        assert!(session.board().hardware_calls().is_empty());

        assert_eq!(peripheral.service_queue(&mut session), 1);
        assert_eq!(session.board().hardware_calls(), vec![Call::Led(LedAction::On)]);
        assert_eq!(peripheral.service_queue(&mut session), 0);
    }

    #[test]
    fn test_failed_command_is_only_logged() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });

        send_command(&mut session, &mut peripheral, 1, &[b"bogus_call()"]);
        assert_eq!(peripheral.service_queue(&mut session), 1);

        send_command(&mut session, &mut peripheral, 1, &[b"led.off()"]);
        assert_eq!(peripheral.service_queue(&mut session), 1);
        assert_eq!(session.board().hardware_calls(), vec![Call::Led(LedAction::Off)]);
    }

    #[test]
    fn test_write_to_other_characteristic_is_ignored() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });

        let other = BleEvent::GattsWrite {
            conn_handle: 1,
            value_handle: COMMAND_HANDLE + 1,
            data: b"led.on()",
        };
        assert_eq!(peripheral.handle_event(&mut session, other), None);
        let id = session.registry().find_central(1).unwrap();
        assert!(session.registry().get(id).unwrap().buffer().is_empty());
    }

    #[test]
    fn test_write_from_unknown_central_is_ignored() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        assert_eq!(peripheral.handle_event(&mut session, write(5, b"led.on()")), None);
        assert_eq!(peripheral.handle_event(&mut session, write(5, SENTINEL)), None);
        assert!(session.queue().is_empty());
    }

    #[test]
    fn test_disconnect_mid_command_discards_partial_input() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });
        peripheral.handle_event(&mut session, write(1, b"led.on("));

        peripheral.handle_event(&mut session, BleEvent::CentralDisconnect { conn_handle: 1 });
        assert!(session.registry().find_central(1).is_none());
        assert!(session.registry().is_advertising());
        assert_eq!(peripheral.advertiser().adverts.len(), 2);

        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });
        let id = session.registry().find_central(1).unwrap();
        assert!(session.registry().get(id).unwrap().buffer().is_empty());

        assert_eq!(peripheral.handle_event(&mut session, write(1, SENTINEL)), None);
        assert!(session.queue().is_empty());
        assert_eq!(peripheral.service_queue(&mut session), 0);
        assert!(session.board().hardware_calls().is_empty());
    }

    #[test]
    fn test_disconnect_discards_queued_commands() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });
        send_command(&mut session, &mut peripheral, 1, &[b"snake_start()"]);
        assert_eq!(session.queue().len(), 1);

        peripheral.handle_event(&mut session, BleEvent::CentralDisconnect { conn_handle: 1 });
        assert!(session.queue().is_empty());
        assert_eq!(peripheral.service_queue(&mut session), 0);
        assert!(session.board().hardware_calls().is_empty());
    }

    #[test]
    fn test_priority_bypass_runs_inline() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });

        send_command(&mut session, &mut peripheral, 1, &[b"led.toggle()"]);
        let dispatch = send_command(&mut session, &mut peripheral, 1, &[b"snake_", b"stop()"]);
        assert_eq!(dispatch, Some(Dispatch::Immediate(ExecutionResult::Success)));

        // Ran before the queue was polled, and the queued command survived.
        assert_eq!(session.board().hardware_calls(), vec![Call::StopGame]);
        assert_eq!(session.queue().len(), 1);

        assert_eq!(peripheral.service_queue(&mut session), 1);
        assert_eq!(
            session.board().hardware_calls(),
            vec![Call::StopGame, Call::Led(LedAction::Toggle)]
        );
    }

    #[test]
    fn test_latest_wins_drops_unconsumed_command() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });

        send_command(&mut session, &mut peripheral, 1, &[b"led.on()"]);
        let dispatch = send_command(&mut session, &mut peripheral, 1, &[b"clear_oled()"]);
        let Some(Dispatch::Queued(SubmitOutcome::Replaced(old))) = dispatch else {
            panic!("expected replacement, got {:?}", dispatch);
        };
        assert_eq!(old.text.as_str(), "led.on()");

        assert_eq!(peripheral.service_queue(&mut session), 1);
        assert_eq!(session.board().hardware_calls(), vec![Call::ClearDisplay]);
    }

    #[test]
    fn test_fifo_policy_runs_every_command_in_order() {
        let config = ChannelConfig {
            queue_policy: QueuePolicy::Fifo,
            ..Default::default()
        };
        let (mut session, mut peripheral) = setup(config);
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 2 });

        send_command(&mut session, &mut peripheral, 1, &[b"led.on()"]);
        send_command(&mut session, &mut peripheral, 2, &[b"clear_oled()"]);
        send_command(&mut session, &mut peripheral, 1, &[b"led.off()"]);

        assert_eq!(peripheral.service_queue(&mut session), 3);
        assert_eq!(
            session.board().hardware_calls(),
            vec![
                Call::Led(LedAction::On),
                Call::ClearDisplay,
                Call::Led(LedAction::Off)
            ]
        );
    }

    #[test]
    fn test_centrals_do_not_share_buffers() {
        let (mut session, mut peripheral) = setup(ChannelConfig {
            queue_policy: QueuePolicy::Fifo,
            ..Default::default()
        });
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 2 });

        peripheral.handle_event(&mut session, write(1, b"led."));
        peripheral.handle_event(&mut session, write(2, b"clear_"));
        peripheral.handle_event(&mut session, write(1, b"on()"));
        peripheral.handle_event(&mut session, write(2, b"oled()"));
        peripheral.handle_event(&mut session, write(2, SENTINEL));
        peripheral.handle_event(&mut session, write(1, SENTINEL));

        assert_eq!(peripheral.service_queue(&mut session), 2);
        assert_eq!(
            session.board().hardware_calls(),
            vec![Call::ClearDisplay, Call::Led(LedAction::On)]
        );
    }

    #[test]
    fn test_link_events_reach_the_board() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 4 });
        peripheral.handle_event(&mut session, BleEvent::CentralDisconnect { conn_handle: 4 });
        assert_eq!(
            session.board().link_events(),
            vec![
                (TransportKind::Ble, LinkEvent::Connected),
                (TransportKind::Ble, LinkEvent::Disconnected)
            ]
        );
    }

    #[test]
    fn test_central_limit_refuses_extra_connections() {
        let (mut session, mut peripheral) = setup(ChannelConfig::default());
        for handle in 0..MAX_CENTRALS as u16 {
            peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: handle });
        }
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 99 });
        assert!(session.registry().find_central(99).is_none());
        assert_eq!(session.registry().count(TransportKind::Ble), MAX_CENTRALS);
    }

    #[test]
    fn test_custom_sentinel() {
        let mut config = ChannelConfig::default();
        config.sentinel.clear();
        config.sentinel.push_str("<END>").unwrap();
        let (mut session, mut peripheral) = setup(config);
        peripheral.handle_event(&mut session, BleEvent::CentralConnect { conn_handle: 1 });

        assert_eq!(peripheral.handle_event(&mut session, write(1, b"led.on()")), None);
        assert_eq!(peripheral.handle_event(&mut session, write(1, SENTINEL)), None);
        let dispatch = peripheral.handle_event(&mut session, write(1, b"<END>"));
        assert_eq!(dispatch, Some(Dispatch::Queued(SubmitOutcome::Accepted)));

        // The old sentinel was ordinary input, so the command does not parse.
        let id = session.registry().find_central(1).unwrap();
        let (pending, result) = session.poll_queue().unwrap();
        assert_eq!(pending.origin, id);
        assert_eq!(pending.text.as_str(), "led.on()_EOT_");
        assert!(!result.is_success());
        assert!(session.board().hardware_calls().is_empty());
    }
}
