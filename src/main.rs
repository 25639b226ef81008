use std::error::Error;
use std::io;

use clap::Parser;
use log::info;
use tlbsim::{
    config::Config,
    memory::{AccessEvent, Translator},
    trace::{TraceEvent, TraceReader},
};

/// Translates a trace of 16-bit virtual addresses through a 4-entry TLB
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Page table description; identity mapped when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Trace of `R:addr` / `W:addr` lines; stdin when omitted
    trace: Option<String>,
}

fn run<I: Iterator<Item = TraceEvent>>(translator: &mut Translator, events: I) {
    println!("{}", AccessEvent::HEADER);
    for event in events {
        match translator.access(event.addr()) {
            Ok(access) => println!("{}", access),
            Err(fault) => println!("{:04x} {}", event.addr(), fault),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    println!("{}", config);

    let pt = config.page_table();
    let mut translator = Translator::new(&pt);

    match &args.trace {
        Some(path) => run(&mut translator, TraceReader::from_file(path)?),
        None => run(&mut translator, TraceReader::from_reader(io::stdin().lock())),
    }

    let stats = translator.stats();
    info!("finished after {} accesses", stats.accesses());
    println!();
    print!("{}", translator.tlb());
    println!("hits: {}  misses: {}  faults: {}", stats.hits, stats.misses, stats.faults);
    Ok(())
}
