//! Builds a fabric, pushes a few UDP frames around and prints what arrived.
//!
//! Run with `cargo run --example fabric_demo [config.toml]`; set
//! `RUST_LOG=debug` to see per-frame logs and dumps.

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use vnic_fabric::network::ethernet::ethertype;
use vnic_fabric::network::ipv4::protocol;
use vnic_fabric::{
    logging, ChannelSink, EthernetHeader, Fabric, FabricConfig, FabricError, InterfaceId,
    Ipv4Header, MacAddress, TransmitOutcome,
};

fn udp_frame(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Option<Vec<u8>> {
    let packet = Ipv4Header::new_simple(protocol::UDP, src, dst, 0).with_payload(payload)?;
    // link-layer addresses are filled in by the fabric
    Some(
        EthernetHeader::new(MacAddress::UNSPECIFIED, MacAddress::UNSPECIFIED, ethertype::IPV4)
            .encapsulate(&packet),
    )
}

fn main() -> Result<(), FabricError> {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => FabricConfig::load(Path::new(&path))?,
        None => FabricConfig::new(
            ["10.0.0.1", "10.0.0.2"],
            ["02:00:00:00:00:01", "02:00:00:00:00:02"],
        ),
    };

    let (sink, frames) = ChannelSink::channel();
    let mut fabric = Fabric::create(&config, Arc::new(sink))?;
    for (id, err) in fabric.open_all() {
        println!("{id}: not opened: {err}");
    }

    let consumer = thread::spawn(move || {
        for frame in frames {
            println!(
                "{} received {} bytes (ethertype {:#06x})",
                frame.interface,
                frame.data.len(),
                frame.ethertype
            );
        }
    });

    let addresses: Vec<(InterfaceId, Ipv4Addr)> =
        fabric.interfaces().iter().map(|i| (i.id(), i.ip())).collect();
    let unknown = Ipv4Addr::new(203, 0, 113, 9);

    for &(source, src_ip) in &addresses {
        let targets = addresses.iter().map(|&(_, ip)| ip).chain([unknown]);
        for dst_ip in targets.filter(|ip| *ip != src_ip) {
            let Some(frame) = udp_frame(src_ip, dst_ip, b"hello over the fabric") else {
                continue;
            };
            match fabric.transmit(source, &frame) {
                Ok(TransmitOutcome::Delivered { interface, len }) => {
                    println!("{source} -> {dst_ip}: delivered to {interface} ({len} bytes)")
                }
                Ok(TransmitOutcome::Dropped(reason)) => {
                    println!("{source} -> {dst_ip}: dropped ({reason})")
                }
                Err(e) => println!("{source} -> {dst_ip}: {e}"),
            }
        }
    }

    fabric.destroy();
    drop(fabric);
    if consumer.join().is_err() {
        println!("consumer thread panicked");
    }
    Ok(())
}
