use std::collections::BTreeMap;

use bytes::BufMut;

use super::codec::{
    FrameKind, MESSAGE_MAGIC, decode_message, decode_response, encode_message, encode_response,
    peek_frame_kind,
};
use super::*;
use crate::error::{AddressError, AppError, AppResult, ProtocolError};
use crate::registry::TargetType;

fn parse(value: &str) -> AppResult<SimulatorAddress> {
    Ok(value.parse::<SimulatorAddress>()?)
}

fn sample_message() -> SimulatorMessage {
    SimulatorMessage {
        message_id: 42,
        source: SimulatorAddress::COORDINATOR,
        destination: SimulatorAddress::test(1, 2, 3),
        operation: Operation::StartTest(StartTestOperation {
            target_type: TargetType::Clients,
            target_workers: vec![SimulatorAddress::worker(1, 2)],
            warmup: false,
        }),
    }
}

#[test]
fn address_text_form_round_trips() -> AppResult<()> {
    for text in ["C", "C_A1", "C_A1_W2", "C_A1_W2_T3", "C_A*_W*", "C_A3_W*_T12"] {
        let address = parse(text)?;
        if address.to_string() != text {
            return Err(AppError::coordinator(format!(
                "expected {} got {}",
                text, address
            )));
        }
    }
    if parse("C_A1_W2_T3")? != SimulatorAddress::test(1, 2, 3) {
        return Err(AppError::coordinator("Parsed test address mismatch"));
    }
    if SimulatorAddress::ALL_WORKERS.to_string() != "C_A*_W*" {
        return Err(AppError::coordinator("Unexpected ALL_WORKERS text"));
    }
    Ok(())
}

#[test]
fn every_constructed_address_survives_text_form() -> AppResult<()> {
    let indices = [0, 1, 7, i32::MAX, ALL_INDEX];
    let mut addresses = vec![SimulatorAddress::COORDINATOR];
    for agent in indices {
        addresses.push(SimulatorAddress::agent(agent));
        for worker in indices {
            addresses.push(SimulatorAddress::worker(agent, worker));
            for test in indices {
                addresses.push(SimulatorAddress::test(agent, worker, test));
            }
        }
    }
    for address in addresses {
        let text = address.to_string();
        if parse(&text)? != address {
            return Err(AppError::coordinator(format!(
                "{} did not parse back to {:?}",
                text, address
            )));
        }
    }
    if SimulatorAddress::agent(0).to_string() != "C_A0" {
        return Err(AppError::coordinator("agent 0 text mismatch"));
    }
    if parse("C_A*_W2147483647")? != SimulatorAddress::worker(ALL_INDEX, i32::MAX) {
        return Err(AppError::coordinator("maximum index did not parse"));
    }
    Ok(())
}

#[test]
fn address_parse_rejects_malformed_text() -> AppResult<()> {
    for text in ["", "X_A1", "C_Ax", "C_W1", "C_A1_W1_T1_X1", "C_A-2", "C_A_W1", "C_A2147483648"] {
        match text.parse::<SimulatorAddress>() {
            Err(AddressError::InvalidAddress { .. }) => {}
            other => {
                return Err(AppError::coordinator(format!(
                    "{:?} parsed as {:?}",
                    text, other
                )));
            }
        }
    }
    Ok(())
}

#[test]
fn address_parent_and_child_walk_the_tree() -> AppResult<()> {
    let test = SimulatorAddress::worker(1, 2).child(3)?;
    if test != SimulatorAddress::test(1, 2, 3) {
        return Err(AppError::coordinator("child of worker is not the test"));
    }
    if test.parent() != Some(SimulatorAddress::worker(1, 2)) {
        return Err(AppError::coordinator("parent of test is not the worker"));
    }
    if SimulatorAddress::COORDINATOR.parent().is_some() {
        return Err(AppError::coordinator("coordinator has no parent"));
    }
    if SimulatorAddress::ALL_WORKERS.child(ALL_INDEX)?.to_string() != "C_A*_W*_T*" {
        return Err(AppError::coordinator("wildcard child mismatch"));
    }
    match test.child(1) {
        Err(AddressError::NoChildLevel { .. }) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "test child returned {:?}",
                other
            )));
        }
    }
    match SimulatorAddress::agent(1).child(0) {
        Err(AddressError::InvalidChildIndex { index: 0 }) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "child(0) returned {:?}",
                other
            )));
        }
    }
    Ok(())
}

#[test]
fn address_prefix_and_wildcard_matching() -> AppResult<()> {
    let test = SimulatorAddress::test(1, 2, 3);
    if !SimulatorAddress::agent(1).is_parent_of(&test) {
        return Err(AppError::coordinator("agent should be parent of its test"));
    }
    if SimulatorAddress::agent(2).is_parent_of(&test) {
        return Err(AppError::coordinator("other agent is not a parent"));
    }
    if SimulatorAddress::agent(1).is_parent_of(&SimulatorAddress::agent(1)) {
        return Err(AppError::coordinator("address is not its own parent"));
    }
    if !SimulatorAddress::ALL_WORKERS.covers(&SimulatorAddress::worker(4, 7)) {
        return Err(AppError::coordinator("ALL_WORKERS should cover every worker"));
    }
    if SimulatorAddress::ALL_WORKERS.covers(&SimulatorAddress::agent(4)) {
        return Err(AppError::coordinator("worker wildcard must not cover agents"));
    }
    if !SimulatorAddress::worker(1, 2).covers(&test) {
        return Err(AppError::coordinator("worker should cover its test"));
    }
    if !SimulatorAddress::ALL_WORKERS.contains_wildcard() || test.contains_wildcard() {
        return Err(AppError::coordinator("wildcard detection mismatch"));
    }
    Ok(())
}

#[test]
fn message_frame_round_trips() -> AppResult<()> {
    let message = sample_message();
    let frame = encode_message(&message)?;
    if peek_frame_kind(&frame)? != FrameKind::Message {
        return Err(AppError::coordinator("frame kind mismatch"));
    }
    let mut src: &[u8] = &frame;
    let decoded = decode_message(&mut src)?;
    if decoded != message {
        return Err(AppError::coordinator(format!("decoded {:?}", decoded)));
    }
    if !src.is_empty() {
        return Err(AppError::coordinator("decoder left bytes behind"));
    }
    Ok(())
}

fn operation_table() -> Vec<Operation> {
    vec![
        Operation::CreateTest(CreateTestOperation {
            test_index: i32::MAX,
            test_id: String::new(),
            properties: BTreeMap::new(),
        }),
        Operation::CreateTest(CreateTestOperation {
            test_index: 0,
            test_id: "map".to_owned(),
            properties: BTreeMap::from([
                (String::new(), String::new()),
                ("threads".to_owned(), "4".to_owned()),
            ]),
        }),
        Operation::StartTest(StartTestOperation {
            target_type: TargetType::All,
            target_workers: Vec::new(),
            warmup: true,
        }),
        Operation::StartTest(StartTestOperation {
            target_type: TargetType::Members,
            target_workers: vec![
                SimulatorAddress::worker(i32::MAX, i32::MAX),
                SimulatorAddress::ALL_WORKERS,
            ],
            warmup: false,
        }),
        Operation::StartTestPhase(StartTestPhaseOperation {
            phase: TestPhase::Setup,
        }),
        Operation::StartTestPhase(StartTestPhaseOperation {
            phase: TestPhase::LocalTeardown,
        }),
        Operation::StopTest(StopTestOperation {}),
        Operation::PhaseCompleted(PhaseCompletedOperation {
            phase: TestPhase::GlobalAfterWarmup,
        }),
        Operation::ExecuteScript(ExecuteScriptOperation {
            command: String::new(),
            fire_and_forget: false,
        }),
        Operation::ExecuteScript(ExecuteScriptOperation {
            command: "echo \"quoted\" ünïcode".to_owned(),
            fire_and_forget: true,
        }),
        Operation::Failure(FailureOperation {
            message: String::new(),
            failure_type: FailureType::WorkerOom,
            worker_address: SimulatorAddress::worker(1, 1),
            test_id: None,
            cause: None,
        }),
        Operation::Failure(FailureOperation {
            message: "boom".to_owned(),
            failure_type: FailureType::WorkerException,
            worker_address: SimulatorAddress::worker(i32::MAX, 0),
            test_id: Some(String::new()),
            cause: Some("line 1\nline 2".to_owned()),
        }),
        Operation::PerformanceStats(PerformanceStatsOperation::default()),
        Operation::PerformanceStats(PerformanceStatsOperation {
            stats: BTreeMap::from([
                ("idle".to_owned(), PerformanceStats::default()),
                (
                    "map".to_owned(),
                    PerformanceStats {
                        operation_count: u64::MAX,
                        interval_operation_count: 0,
                        interval_throughput: 1.5,
                        interval_latency_max_nanos: u64::MAX,
                    },
                ),
            ]),
        }),
        Operation::Log(LogOperation {
            message: String::new(),
            level: LogLevel::Debug,
        }),
        Operation::Log(LogOperation {
            message: "worker ready".to_owned(),
            level: LogLevel::Error,
        }),
    ]
}

#[test]
fn every_operation_kind_round_trips_through_a_frame() -> AppResult<()> {
    let operations = operation_table();
    let mut kinds = std::collections::BTreeSet::new();
    for (message_id, operation) in [0, 1, u64::MAX].into_iter().cycle().zip(operations) {
        kinds.insert(operation.operation_type().code());
        let message = SimulatorMessage {
            message_id,
            source: SimulatorAddress::test(i32::MAX, 1, i32::MAX),
            destination: SimulatorAddress::ALL_WORKERS,
            operation,
        };
        let frame = encode_message(&message)?;
        if encode_message(&message)? != frame {
            return Err(AppError::coordinator(format!(
                "encoding of {} is not deterministic",
                message.operation.operation_type()
            )));
        }
        let mut src: &[u8] = &frame;
        let decoded = decode_message(&mut src)?;
        if decoded != message {
            return Err(AppError::coordinator(format!(
                "expected {:?} got {:?}",
                message, decoded
            )));
        }
        if !src.is_empty() {
            return Err(AppError::coordinator("decoder left bytes behind"));
        }
    }
    if kinds.len() != 9 {
        return Err(AppError::coordinator(format!(
            "table covers {} operation kinds",
            kinds.len()
        )));
    }
    Ok(())
}

#[test]
fn response_frame_keeps_every_part() -> AppResult<()> {
    let mut response = Response::new(7, SimulatorAddress::ALL_WORKERS);
    response.add_part(SimulatorAddress::worker(1, 1), ResponseType::Success);
    response.add_part(
        SimulatorAddress::worker(1, 2),
        ResponseType::FailureTestNotFound,
    );
    let frame = encode_response(&response)?;
    let mut src: &[u8] = &frame;
    let decoded = decode_response(&mut src)?;
    if decoded != response {
        return Err(AppError::coordinator(format!("decoded {:?}", decoded)));
    }
    if decoded.first_error()
        != Some((
            SimulatorAddress::worker(1, 2),
            ResponseType::FailureTestNotFound,
        ))
    {
        return Err(AppError::coordinator("first_error mismatch"));
    }
    Ok(())
}

#[test]
fn decode_with_wrong_magic_consumes_nothing() -> AppResult<()> {
    let response = Response::single(
        1,
        SimulatorAddress::COORDINATOR,
        SimulatorAddress::worker(1, 1),
        ResponseType::Success,
    );
    let frame = encode_response(&response)?;
    let mut src: &[u8] = &frame;
    match decode_message(&mut src) {
        Err(ProtocolError::BadMagic { .. }) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected bad magic, got {:?}",
                other
            )));
        }
    }
    if src.len() != frame.len() {
        return Err(AppError::coordinator("input was consumed on error"));
    }
    // The untouched buffer still decodes as what it is.
    decode_response(&mut src)?;
    Ok(())
}

#[test]
fn partial_frame_reports_incomplete() -> AppResult<()> {
    let frame = encode_message(&sample_message())?;
    let Some(half) = frame.get(..frame.len().saturating_div(2)) else {
        return Err(AppError::coordinator("frame too short"));
    };
    let mut src = half;
    match decode_message(&mut src) {
        Err(ProtocolError::Incomplete { available, .. }) if available == half.len() => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected incomplete, got {:?}",
                other
            )));
        }
    }
    if src.len() != half.len() {
        return Err(AppError::coordinator("input was consumed on error"));
    }
    Ok(())
}

#[test]
fn unknown_operation_kind_is_rejected() -> AppResult<()> {
    let body = b"{}";
    let mut payload = Vec::new();
    payload.put_u64(9);
    for address in [SimulatorAddress::COORDINATOR, SimulatorAddress::agent(1)] {
        payload.put_u8(address.level().depth());
        payload.put_i32(address.agent_index());
        payload.put_i32(address.worker_index());
        payload.put_i32(address.test_index());
    }
    payload.put_u16(99);
    payload.put_slice(body);

    let mut frame = Vec::new();
    frame.put_u32(MESSAGE_MAGIC);
    frame.put_u32(u32::try_from(payload.len()).unwrap_or(u32::MAX));
    frame.put_slice(&payload);

    let mut src: &[u8] = &frame;
    match decode_message(&mut src) {
        Err(ProtocolError::UnknownOperationKind { code: 99 }) => Ok(()),
        other => Err(AppError::coordinator(format!(
            "expected unknown kind, got {:?}",
            other
        ))),
    }
}

#[test]
fn operation_and_response_codes_are_stable() -> AppResult<()> {
    for code in 1..=9u16 {
        let Some(kind) = OperationType::from_code(code) else {
            return Err(AppError::coordinator(format!("no operation for {}", code)));
        };
        if kind.code() != code {
            return Err(AppError::coordinator(format!("code drift for {}", kind)));
        }
    }
    for code in 0..=6u16 {
        let Some(response_type) = ResponseType::from_code(code) else {
            return Err(AppError::coordinator(format!("no response for {}", code)));
        };
        if response_type.code() != code {
            return Err(AppError::coordinator(format!("code drift for {}", response_type)));
        }
    }
    if OperationType::from_code(0).is_some() || ResponseType::from_code(7).is_some() {
        return Err(AppError::coordinator("unknown codes must not map"));
    }
    Ok(())
}

#[test]
fn phase_order_and_names() -> AppResult<()> {
    let mut walked = vec![TestPhase::Setup];
    let mut current = TestPhase::Setup;
    while let Some(next) = current.next() {
        walked.push(next);
        current = next;
    }
    if walked != TestPhase::ALL.to_vec() {
        return Err(AppError::coordinator("next() does not follow ALL"));
    }
    if !TestPhase::ALL.windows(2).all(|pair| match pair {
        [first, second] => first < second,
        _ => false,
    }) {
        return Err(AppError::coordinator("phases are not ordered"));
    }
    if "global-teardown".parse::<TestPhase>()? != TestPhase::GlobalTeardown {
        return Err(AppError::coordinator("phase name normalization failed"));
    }
    if "bogus".parse::<TestPhase>().is_ok() {
        return Err(AppError::coordinator("unknown phase accepted"));
    }
    if !TestPhase::GlobalVerify.is_global() || TestPhase::LocalVerify.is_global() {
        return Err(AppError::coordinator("scope mismatch"));
    }
    Ok(())
}

#[test]
fn operation_bodies_serialize_as_json() -> AppResult<()> {
    let create = CreateTestOperation {
        test_index: 1,
        test_id: "map".to_owned(),
        properties: BTreeMap::from([("threads".to_owned(), "4".to_owned())]),
    };
    let value = serde_json::to_value(&create)
        .map_err(|err| AppError::coordinator(format!("serialize failed: {}", err)))?;
    if value.get("test_id").and_then(|id| id.as_str()) != Some("map") {
        return Err(AppError::coordinator("test_id missing"));
    }
    let phase = serde_json::to_string(&StartTestPhaseOperation {
        phase: TestPhase::GlobalPrepare,
    })
    .map_err(|err| AppError::coordinator(format!("serialize failed: {}", err)))?;
    if phase != r#"{"phase":"GLOBAL_PREPARE"}"# {
        return Err(AppError::coordinator(format!("unexpected phase json {}", phase)));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn frames_cross_an_in_memory_stream() -> AppResult<()> {
    let (mut left, mut right) = tokio::io::duplex(4096);
    let message = sample_message();
    write_message(&mut left, &message).await?;
    let response = Response::single(
        42,
        SimulatorAddress::COORDINATOR,
        SimulatorAddress::test(1, 2, 3),
        ResponseType::Success,
    );
    write_response(&mut left, &response).await?;
    drop(left);

    match read_frame(&mut right).await? {
        Frame::Message(received) if received == message => {}
        other => return Err(AppError::coordinator(format!("got {:?}", other))),
    }
    match read_frame(&mut right).await? {
        Frame::Response(received) if received == response => {}
        other => return Err(AppError::coordinator(format!("got {:?}", other))),
    }
    match read_frame(&mut right).await {
        Err(ProtocolError::ConnectionClosed) => Ok(()),
        other => Err(AppError::coordinator(format!(
            "expected closed stream, got {:?}",
            other
        ))),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn pending_responses_resolve_and_cancel() -> AppResult<()> {
    let pending = PendingResponses::new();
    let first = pending.register();
    let second = pending.register();
    if first.message_id() == second.message_id() {
        return Err(AppError::coordinator("message ids must be unique"));
    }
    if pending.pending_count() != 2 {
        return Err(AppError::coordinator("expected two pending responses"));
    }

    let response = Response::single(
        first.message_id(),
        SimulatorAddress::COORDINATOR,
        SimulatorAddress::agent(1),
        ResponseType::Success,
    );
    if !pending.complete(response.clone()) {
        return Err(AppError::coordinator("complete found no waiter"));
    }
    if first.wait().await? != response {
        return Err(AppError::coordinator("wrong response delivered"));
    }

    pending.cancel(second.message_id());
    if second.wait().await.is_ok() {
        return Err(AppError::coordinator("cancelled response should drop"));
    }
    if pending.pending_count() != 0 {
        return Err(AppError::coordinator("table should be empty"));
    }
    Ok(())
}
