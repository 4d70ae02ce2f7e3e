use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context};
use structopt::StructOpt;

use legoirc::channel::CommandChannel;
use legoirc::clock::{Clock, SystemClock};
use legoirc::config::{self, SessionConfig};
use legoirc::emitter::{EmitterError, PulseEmitter};
use legoirc::irsend::Transmitter;
use legoirc::scheduler::Scheduler;
use legoirc::server::Server;
use legoirc::shutdown::{NoHalt, ShutdownAction, SystemHalt};
use legoirc::vcdutils::VcdEmitter;
use legoirc::{client, decode};

#[derive(Debug, StructOpt)]
#[structopt(name = "legoirc", about = "LEGO Power Functions infrared remote control")]
struct Opt {
    /// Debug level [0-3]
    #[structopt(short, long, default_value = "0")]
    debug: u8,
    #[structopt(subcommand)]
    cmd: CliCommand,
}

#[derive(StructOpt, Debug)]
enum CliCommand {
    /// Receive keys over tcp and transmit them
    Serve {
        /// Server port number
        #[structopt(short, long, default_value = "5001")]
        port: u16,
        /// IR channel [1-4]
        #[structopt(short, long, default_value = "1")]
        channel: u8,
        /// IR mode: 1 extended, 2 combo direct, 3 single output, 4 combo PWM
        #[structopt(short, long, default_value = "4")]
        mode: u8,
        /// GPIO the IR LED is connected to
        #[structopt(short, long, default_value = "24")]
        gpio: u64,
        /// Write the waveform to a vcd file instead of the gpio
        #[structopt(long, parse(from_os_str))]
        vcd: Option<PathBuf>,
        /// Do not halt the system on the shutdown command
        #[structopt(long)]
        no_halt: bool,
    },
    /// Send key presses to a server
    Client {
        /// Server address
        #[structopt(short, long)]
        server: String,
        #[structopt(short, long, default_value = "5001")]
        port: u16,
    },
    /// Decode frames from a vcd file
    Decode {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
}

type SchedulerHandle = JoinHandle<Result<(), EmitterError>>;

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    env_logger::Builder::new()
        .filter_level(config::log_level(opt.debug))
        .init();

    match opt.cmd {
        CliCommand::Serve {
            port,
            channel,
            mode,
            gpio,
            vcd,
            no_halt,
        } => {
            let config = SessionConfig::new(port, channel, mode, gpio, opt.debug)?;
            serve(Arc::new(config), vcd, no_halt)
        }
        CliCommand::Client { server, port } => {
            client::run(&server, port).with_context(|| format!("client {}:{}", server, port))
        }
        CliCommand::Decode { path } => {
            decode::command_decode(&path).with_context(|| format!("decoding {}", path.display()))
        }
    }
}

fn serve(config: Arc<SessionConfig>, vcd: Option<PathBuf>, no_halt: bool) -> anyhow::Result<()> {
    log::debug!("Server port number: {}", config.port());
    log::debug!("GPIO: {}", config.gpio_pin());
    log::debug!("IR channel: {}", config.channel().number());
    log::debug!("IR mode: {:?}", config.mode());
    log::debug!("Burst period: {} us", config.timing().message_period());
    log::debug!("Log level: {}", config.log_level());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let channel = Arc::new(CommandChannel::new(clock.clone()));
    let stop = Arc::new(AtomicBool::new(false));

    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("Interruption caught");
            stop.store(true, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;
    }

    let server = Server::bind(("0.0.0.0", config.port()))
        .with_context(|| format!("binding port {}", config.port()))?;

    let scheduler = match vcd {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let emitter = VcdEmitter::new(file, clock.clone())?;
            log::info!("Writing the waveform to {}", path.display());
            start_scheduler(emitter, &config, &channel, &stop)?
        }
        None => start_scheduler(gpio_emitter(&config, &clock)?, &config, &channel, &stop)?,
    };

    let shutdown: Arc<dyn ShutdownAction> = if no_halt {
        Arc::new(NoHalt)
    } else {
        Arc::new(SystemHalt)
    };

    let served = server.run(channel, shutdown, stop.clone());
    stop.store(true, Ordering::SeqCst);

    let transmitted = scheduler
        .join()
        .map_err(|_| anyhow!("transmission thread panicked"))?;

    served.context("accepting connections")?;
    transmitted.context("transmitting")?;

    Ok(())
}

fn start_scheduler<E>(
    emitter: E,
    config: &SessionConfig,
    channel: &Arc<CommandChannel>,
    stop: &Arc<AtomicBool>,
) -> anyhow::Result<SchedulerHandle>
where
    E: PulseEmitter + Send + 'static,
{
    let transmitter = Transmitter::new(emitter, config.timing());
    let scheduler = Scheduler::new(channel.clone(), transmitter, config.mode());

    scheduler
        .spawn(stop.clone())
        .context("starting the transmission thread")
}

#[cfg(target_os = "linux")]
fn gpio_emitter(config: &SessionConfig, clock: &Arc<dyn Clock>) -> anyhow::Result<impl PulseEmitter + Send + 'static> {
    use legoirc::emitter::{sysfs_pin, GpioEmitter};

    let pin = sysfs_pin(config.gpio_pin()).with_context(|| format!("opening gpio {}", config.gpio_pin()))?;
    Ok(GpioEmitter::new(pin, clock.clone())?)
}

#[cfg(not(target_os = "linux"))]
fn gpio_emitter(
    _config: &SessionConfig,
    _clock: &Arc<dyn Clock>,
) -> anyhow::Result<legoirc::vcdutils::VcdEmitter<std::io::Sink>> {
    anyhow::bail!("gpio output needs Linux sysfs, use --vcd")
}
