//! E2E tests for the ingest path (encode → datagram → decode → store)
//!
//! Sample values are generated from seeded random numbers so failures
//! reproduce. Replayed datagrams exercise the loop without a socket; one
//! test goes through a loopback UDP socket.

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nuprism_rs::common::StopFlag;
use nuprism_rs::ingest::{
    DatagramSource, IngestConfig, IngestEvent, Ingestor, ReplaySource, UdpDatagramSource,
};
use nuprism_rs::protocol::constants::{DATA_PACKET_SIZE, HEADER_SIZE, NUM_CH_PER_ADC};
use nuprism_rs::protocol::{
    classify, decode, encode_data_packet, encode_trigger_packet, DataRecord, DecodeError,
    DeviceHeader, PacketKind, PayloadLayout, Record, TriggerRecord,
};
use nuprism_rs::store::SampleStore;
use rand::prelude::*;
use rand::rngs::StdRng;

/// Random data record for `adc_id` under `layout`
fn make_random_record(rng: &mut StdRng, adc_id: u8, layout: PayloadLayout) -> DataRecord {
    let n = layout.quadruples_per_packet();
    let mut header = DeviceHeader {
        num_words: rng.gen(),
        packet_id: rng.gen(),
        frame_id: rng.gen(),
        timestamp: rng.gen(),
        trigger_count: rng.gen(),
        user_words: [rng.gen(), rng.gen(), rng.gen(), rng.gen()],
    };
    header.set_adc_id(adc_id);
    DataRecord {
        header,
        adc_id,
        channels: std::array::from_fn(|_| (0..n).map(|_| rng.gen()).collect()),
    }
}

/// Wraps a source and sets the stop flag once it runs dry
struct StopWhenEmpty<S> {
    inner: S,
    stop: StopFlag,
}

impl<S: DatagramSource> DatagramSource for StopWhenEmpty<S> {
    fn receive(&mut self, buf: &mut [u8]) -> std::io::Result<Option<usize>> {
        let next = self.inner.receive(buf)?;
        if next.is_none() {
            self.stop.request_stop();
        }
        Ok(next)
    }
}

fn ingestor(max_samples: usize, layout: PayloadLayout) -> Ingestor {
    let store = Arc::new(SampleStore::new(max_samples).unwrap());
    let config = IngestConfig {
        layout,
        ..Default::default()
    };
    Ingestor::new(config, store)
}

#[test]
fn test_malformed_flood_then_valid_packet_is_stored() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut source = ReplaySource::new();
    while source.len() < 1000 {
        let len = match rng.gen_range(0..3) {
            0 => rng.gen_range(0..HEADER_SIZE),
            1 => rng.gen_range(HEADER_SIZE..1500),
            _ => DATA_PACKET_SIZE,
        };
        let mut datagram = vec![0u8; len];
        rng.fill(&mut datagram[..]);
        if len == 58 {
            continue;
        }
        if len == DATA_PACKET_SIZE {
            // Out-of-range ADC id
            datagram[38] = rng.gen_range(5..=255);
        }
        source.push(datagram);
    }

    let record = make_random_record(&mut rng, 4, PayloadLayout::Dense);
    source.push(encode_data_packet(&record, PayloadLayout::Dense).unwrap().to_vec());

    let ingestor = ingestor(1024, PayloadLayout::Dense);
    let stop = StopFlag::new();
    let mut source = StopWhenEmpty {
        inner: source,
        stop: stop.clone(),
    };
    let mut events: Vec<IngestEvent> = Vec::new();
    let summary = ingestor.run(&mut source, &mut events, &stop);

    assert_eq!(summary.decode_errors(), 1000);
    assert_eq!(summary.data_packets, 1);
    for ch in 0..NUM_CH_PER_ADC {
        assert_eq!(ingestor.store().recent(4, ch).unwrap(), record.channels[ch]);
    }
}

#[test]
fn test_random_records_round_trip_through_store() {
    let mut rng = StdRng::seed_from_u64(42);

    for layout in [PayloadLayout::Dense, PayloadLayout::Strided] {
        let per_packet = layout.quadruples_per_packet();
        let max_samples = per_packet * 3;
        let ingestor = ingestor(max_samples, layout);

        // Five packets per ADC; only the last three fit
        let mut sent: Vec<Vec<DataRecord>> = vec![Vec::new(); 5];
        let mut source = ReplaySource::new();
        for _ in 0..5 {
            for adc_id in 0..5u8 {
                let record = make_random_record(&mut rng, adc_id, layout);
                source.push(encode_data_packet(&record, layout).unwrap().to_vec());
                sent[adc_id as usize].push(record);
            }
        }

        let stop = StopFlag::new();
        let mut source = StopWhenEmpty {
            inner: source,
            stop: stop.clone(),
        };
        let summary = ingestor.run(&mut source, &mut Vec::<IngestEvent>::new(), &stop);
        assert_eq!(summary.data_packets, 25);

        for (adc_id, records) in sent.iter().enumerate() {
            for ch in 0..NUM_CH_PER_ADC {
                let expected: Vec<i16> = records[2..]
                    .iter()
                    .flat_map(|r| r.channels[ch].iter().copied())
                    .collect();
                let stored = ingestor.store().recent(adc_id, ch).unwrap();
                assert_eq!(stored, expected, "layout {} adc {} ch {}", layout, adc_id, ch);
            }
            assert_eq!(
                ingestor.store().total_pushed(adc_id).unwrap(),
                (per_packet * 5) as u64
            );
        }
    }
}

#[test]
fn test_triggers_reach_sink_in_order() {
    let mut rng = StdRng::seed_from_u64(7);
    let triggers: Vec<TriggerRecord> = (0..20)
        .map(|i| TriggerRecord::new(DeviceHeader::default(), i, rng.gen(), rng.gen()))
        .collect();
    let source: ReplaySource = triggers
        .iter()
        .map(|t| encode_trigger_packet(t).to_vec())
        .collect();

    let ingestor = ingestor(16, PayloadLayout::Dense);
    let stop = StopFlag::new();
    let mut source = StopWhenEmpty {
        inner: source,
        stop: stop.clone(),
    };
    let mut events: Vec<IngestEvent> = Vec::new();
    ingestor.run(&mut source, &mut events, &stop);

    let received: Vec<TriggerRecord> = events
        .into_iter()
        .filter_map(|e| match e {
            IngestEvent::Trigger(t) => Some(t),
            IngestEvent::Report(_) => None,
        })
        .collect();
    assert_eq!(received, triggers);
}

#[test]
fn test_decode_properties_by_length() {
    let mut rng = StdRng::seed_from_u64(99);

    for len in 0..HEADER_SIZE {
        let datagram = vec![0u8; len];
        assert_eq!(classify(&datagram), PacketKind::Truncated);
        assert_eq!(decode(&datagram), Err(DecodeError::Truncated { len }));
    }

    for _ in 0..200 {
        let len = rng.gen_range(HEADER_SIZE..2048);
        if len == 58 || len == DATA_PACKET_SIZE {
            continue;
        }
        let mut datagram = vec![0u8; len];
        rng.fill(&mut datagram[..]);
        assert_eq!(classify(&datagram), PacketKind::Unknown);
        assert_eq!(decode(&datagram), Err(DecodeError::Unclassified { len }));
    }

    let record = make_random_record(&mut rng, 0, PayloadLayout::Dense);
    let bytes = encode_data_packet(&record, PayloadLayout::Dense).unwrap();
    match decode(&bytes).unwrap() {
        Record::Data(decoded) => {
            assert_eq!(decoded.num_quadruples(), 128);
            assert_eq!(decoded, record);
        }
        other => panic!("expected data record, got {:?}", other),
    }
}

#[test]
fn test_loopback_udp_end_to_end() {
    let mut source = UdpDatagramSource::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
    let target = source.local_addr().unwrap();

    let ingestor = Arc::new(ingestor(256, PayloadLayout::Dense));
    let stop = StopFlag::new();

    let worker = {
        let ingestor = ingestor.clone();
        let stop = stop.clone();
        thread::spawn(move || ingestor.run(&mut source, &mut Vec::<IngestEvent>::new(), &stop))
    };

    let mut rng = StdRng::seed_from_u64(5);
    let record = make_random_record(&mut rng, 2, PayloadLayout::Dense);
    let bytes = encode_data_packet(&record, PayloadLayout::Dense).unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(&bytes, target).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while ingestor.store().filled(2).unwrap() < 128 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    stop.request_stop();
    let summary = worker.join().unwrap();

    assert_eq!(summary.data_packets, 1);
    assert_eq!(ingestor.store().recent(2, 3).unwrap(), record.channels[3]);
}

#[test]
fn test_concurrent_reader_sees_whole_packets() {
    let store = Arc::new(SampleStore::new(128).unwrap());
    let ingestor = Ingestor::new(IngestConfig::default(), store.clone());
    let stop = StopFlag::new();

    // Every packet carries one constant value on all four channels
    let source: ReplaySource = (0..500i16)
        .map(|v| {
            let record = DataRecord {
                header: DeviceHeader::default(),
                adc_id: 1,
                channels: std::array::from_fn(|_| vec![v; 128]),
            };
            encode_data_packet(&record, PayloadLayout::Dense).unwrap().to_vec()
        })
        .collect();

    let reader = {
        let store = store.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.should_stop() {
                let snapshot = store.snapshot_adc(1).unwrap();
                let first = snapshot[0].clone();
                for ch in &snapshot[1..] {
                    assert_eq!(ch, &first, "torn read across channels");
                }
            }
        })
    };

    let mut source = StopWhenEmpty {
        inner: source,
        stop: stop.clone(),
    };
    ingestor.run(&mut source, &mut Vec::<IngestEvent>::new(), &stop);
    reader.join().unwrap();

    assert_eq!(store.recent(1, 0).unwrap(), vec![499; 128]);
}
