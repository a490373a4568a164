// Copyright (c) 2017 Mike Kershaw and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The Kismet server binary: parses the command line, installs the
//! crash and shutdown handlers, constructs every subsystem in the
//! canonical order, and hands control to the event loop.

extern crate clap;
extern crate env_logger;
extern crate kismet_core;
extern crate kismet_server;
extern crate libc;
#[macro_use]
extern crate log;

use std::env;
use std::ffi::CStr;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use std::time::Duration;

use clap::{App, AppSettings, Arg, ErrorKind};

use kismet_core::env as henv;
use kismet_core::os::signals;
use kismet_core::os::users;

use kismet_server::alertracker::{Alertracker, AlertrackerKey};
use kismet_server::channeltracker::{Channeltracker, ChanneltrackerKey};
use kismet_server::configfile::{munge_to_printable, ConfigFile, ConfigKey};
use kismet_server::datasourcetracker::{Datasourcetracker, DatasourcetrackerKey};
use kismet_server::devicetracker::{Devicetracker, DevicetrackerKey};
use kismet_server::dissectors::IpdataDissector;
use kismet_server::dlt::{Prism2Dlt, PpiDlt, RadiotapDlt};
use kismet_server::dumpfile;
use kismet_server::dumpfile::alert::DumpfileAlert;
use kismet_server::dumpfile::gpsxml::DumpfileGpsxml;
use kismet_server::dumpfile::netxml::DumpfileNetxml;
use kismet_server::dumpfile::nettxt::DumpfileNettxt;
use kismet_server::dumpfile::pcap::{DumpfilePcap, PcapDumpKey};
use kismet_server::dumpfile::strings::DumpfileStrings;
use kismet_server::dumpfile::tuntap::DumpfileTuntap;
use kismet_server::entrytracker::{EntryTracker, EntryTrackerKey};
use kismet_server::gps::{GpsManager, GpsManagerKey};
use kismet_server::httpd::restmessage::{RestMessageClient, RestMessageKey};
use kismet_server::httpd::websession::{Websession, WebsessionKey};
use kismet_server::httpd::{Httpd, HttpdServerKey};
use kismet_server::manuf::{Manuf, ManufKey};
use kismet_server::messagebus::{
    self, FatalQueueClient, FatalQueueKey, MessageBus, MessageBusKey, MessageClient,
    MessageFlags, StdoutClient,
};
use kismet_server::packetchain::{Packetchain, PacketchainKey};
#[cfg(feature = "use-packetsource-pcapfile")]
use kismet_server::packetsource::{PacketSource, PcapfileSource, SourceDefinition};
use kismet_server::phy80211::Phy80211;
use kismet_server::plugintracker::{Plugintracker, PlugintrackerKey};
use kismet_server::registry::{GlobalRegistry, Version};
use kismet_server::rootipc::{self, RootIpc, RootIpcKey};
use kismet_server::server;
use kismet_server::sourcetracker::{Sourcetracker, SourcetrackerKey};
use kismet_server::statealert::BssTimestampAlert;
use kismet_server::systemmonitor::{Systemmonitor, SystemmonitorKey};
use kismet_server::timetracker::{Timetracker, TimetrackerKey};
use kismet_server::{
    CONFIG_BASE, PID_BASE, REVDATE, REVISION, SYSCONF_LOC, VERSION_MAJOR, VERSION_MINOR,
    VERSION_TINY,
};

/// Environment override for the capture-helper handshake window, in
/// seconds. An environment knob because the handshake runs before the
/// config file is read.
const IPC_SYNC_TIMEOUT_ENV: &'static str = "KISMET_IPC_SYNC_TIMEOUT";

const DEFAULT_LOGTYPES: &'static str = "pcapdump,netxml,nettxt,gpsxml,alert";
const DEFAULT_LOGTEMPLATE: &'static str = "%p/%n.%l";

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = env::args().collect();

    // First pass: only the flags that decide whether the crash
    // handlers go in. Everything else waits for the full parse.
    let debug_mode = args.iter().any(|a| a == "--debug");

    env_logger::init();

    if let Err(e) = signals::init(debug_mode) {
        eprintln!("Unable to install signal handlers: {}", e);
        return 1;
    }

    let registry = GlobalRegistry::new(
        Version {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            tiny: VERSION_TINY,
            revision: REVISION,
            revdate: REVDATE,
        },
        args,
    );
    registry.register_usage_func(Devicetracker::usage);

    let matches = match cli().get_matches_safe() {
        Ok(matches) => matches,
        Err(e) => {
            if e.kind == ErrorKind::HelpDisplayed {
                usage(&registry, &e.message);
            } else {
                eprintln!("{}", e.message);
            }
            return 1;
        }
    };

    if matches.is_present("VERSION") {
        println!("Kismet {}-{}-{}", VERSION_MAJOR, VERSION_MINOR, VERSION_TINY);
        return 1;
    }

    let mut local_silent = false;
    let mut daemonize = false;
    let mut plugins = true;
    let mut startroot = true;

    if matches.is_present("NO_LINE_WRAP") {
        messagebus::set_linewrap(false);
    }
    if matches.is_present("SILENT") {
        local_silent = true;
    }
    if matches.is_present("DAEMONIZE") {
        daemonize = true;
        local_silent = true;
    }
    if matches.is_present("NO_PLUGINS") {
        plugins = false;
    }
    if matches.is_present("NO_ROOT") {
        startroot = false;
    }

    match matches.value_of("HOMEDIR") {
        Some(dir) => registry.set_homedir(PathBuf::from(dir)),
        None => {
            if let Some(home) = users::home_dir() {
                registry.set_homedir(home);
            }
        }
    }

    if let Some(sources) = matches.values_of("CAPTURE_SOURCE") {
        for source in sources {
            registry.add_cmdline_source(source);
        }
    }
    if let Some(leftover) = matches.values_of("SUBOPTS") {
        // Unrecognized options belong to subsystem-reserved codes;
        // collect them for whoever claims them.
        for opt in leftover {
            registry.add_subsystem_optarg(opt);
        }
    }

    if let Ok(window) = henv::var(IPC_SYNC_TIMEOUT_ENV) {
        if let Ok(secs) = window.parse::<u64>() {
            registry.set_ipc_sync_timeout(Duration::from_secs(secs));
        }
    }

    // First order: the message bus and the console clients.
    let bus = MessageBus::new();
    registry.register_lifetime_global(bus.clone());
    registry
        .insert::<MessageBusKey>(bus.clone())
        .expect("message bus registered twice");

    let stdout_client = StdoutClient::new();
    let fatal_client = FatalQueueClient::new();
    bus.register_client(
        fatal_client.clone(),
        MessageFlags::FATAL | MessageFlags::ERROR,
    );
    bus.register_client(stdout_client.clone(), MessageFlags::ALL);
    registry
        .insert::<FatalQueueKey>(fatal_client.clone())
        .expect("fatal queue registered twice");

    let mut poll_tokens = Vec::new();

    // Privilege split: spawn the suid capture helper unless we are
    // already root or were asked not to.
    let uid = users::get_current_uid();
    let mut root_ipc: Option<Rc<RootIpc>> = None;
    if uid != 0 && !startroot {
        registry.message(
            MessageFlags::INFO | MessageFlags::PRINTERROR,
            "Not running as root, and --no-root was requested.  Will not attempt \
             to spawn Kismet capture binary.  This will make it impossible to add \
             sources which require root.",
        );
    } else if uid != 0 {
        registry.message(
            MessageFlags::INFO,
            "Not running as root - will try to launch root control binary \
             (kismet_capture) to control cards.",
        );
        let ipc = RootIpc::spawn(&registry);
        poll_tokens.push(registry.register_pollable_rc(&ipc));
        registry.register_lifetime_global(ipc.clone());
        registry
            .insert::<RootIpcKey>(ipc.clone())
            .expect("root ipc registered twice");
        rootipc::bootstrap(&registry, &ipc);
        root_ipc = Some(ipc);
    } else {
        registry.message(
            MessageFlags::ERROR,
            "Kismet was started as root, NOT launching external control binary.  \
             This is NOT the preferred method of starting Kismet as Kismet will \
             continue to run as root the entire time.  Please read the README \
             file section about Installation & Security and be sure this is \
             what you want to do.",
        );
    }

    // Locate, parse, and publish the config file. A bad config is an
    // immediate exit; nothing else has been set up yet.
    let config_path = match matches.value_of("CONFIG_FILE") {
        Some(path) => PathBuf::from(path),
        None => {
            let confdir = henv::var("KISMET_CONF").unwrap_or_else(|_| SYSCONF_LOC.to_string());
            PathBuf::from(confdir).join(CONFIG_BASE)
        }
    };
    registry.message(
        MessageFlags::INFO,
        &format!("Reading from config file {}", config_path.display()),
    );
    let config = match ConfigFile::parse(&config_path) {
        Ok(config) => config,
        Err(e) => {
            registry.message(MessageFlags::FATAL, &format!("{}", e));
            fatal_client.dump_fatals();
            return 1;
        }
    };
    registry.register_lifetime_global(config.clone());
    registry
        .insert::<ConfigKey>(config.clone())
        .expect("config registered twice");

    if let Some(Ok(secs)) = config.fetch_opt_as::<u64>("shutdown_drain") {
        registry.set_shutdown_drain(Duration::from_secs(secs));
    }

    write_pid_file(&registry, &config);

    // The timer must exist before anything that installs timers.
    let timetracker = Timetracker::new();
    registry.register_lifetime_global(timetracker.clone());
    registry
        .insert::<TimetrackerKey>(timetracker)
        .expect("timetracker registered twice");

    // The web server exists (but does not listen) before most things.
    registry.message(MessageFlags::INFO, "Starting Kismet web server...");
    let httpd = Httpd::new(&config);
    registry.register_lifetime_global(httpd.clone());
    registry
        .insert::<HttpdServerKey>(httpd.clone())
        .expect("httpd registered twice");
    httpd.set_poll_token(registry.register_pollable_rc(&httpd));
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    let entrytracker = EntryTracker::new();
    registry.register_lifetime_global(entrytracker.clone());
    registry
        .insert::<EntryTrackerKey>(entrytracker)
        .expect("entrytracker registered twice");

    if daemonize {
        match unsafe { libc::fork() } {
            0 => {
                registry.set_daemonized();
                bus.remove_client(&(fatal_client.clone() as Rc<dyn MessageClient>));
                bus.remove_client(&(stdout_client.clone() as Rc<dyn MessageClient>));
            }
            -1 => {
                registry.message(MessageFlags::FATAL, "Unable to fork for daemonization");
                return server::spindown(&registry);
            }
            _ => {
                eprintln!("Silencing output and entering daemon mode...");
                return 1;
            }
        }
    }

    // Server name: config override, else hostname, else the default.
    match config.fetch_opt("servername") {
        Some(name) => registry.set_servername(&munge_to_printable(&name)),
        None => match hostname() {
            Some(name) => registry.set_servername(&name),
            None => registry.set_servername("Kismet"),
        },
    }

    registry.message(MessageFlags::INFO, "Creating packet chain...");
    let chain = Packetchain::new();
    registry.register_lifetime_global(chain.clone());
    registry
        .insert::<PacketchainKey>(chain.clone())
        .expect("packetchain registered twice");
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    let restmessage = RestMessageClient::new();
    bus.register_client(restmessage.clone(), MessageFlags::ALL);
    httpd.register_handler(restmessage.clone());
    registry.register_lifetime_global(restmessage.clone());
    registry
        .insert::<RestMessageKey>(restmessage)
        .expect("rest message client registered twice");

    let websession = Websession::new(&registry, &config);
    httpd.register_handler(websession.clone());
    registry.register_lifetime_global(websession.clone());
    registry
        .insert::<WebsessionKey>(websession)
        .expect("websession registered twice");

    let channeltracker = Channeltracker::new();
    Channeltracker::hook_chain(&channeltracker, &chain);
    registry.register_lifetime_global(channeltracker.clone());
    registry
        .insert::<ChanneltrackerKey>(channeltracker)
        .expect("channeltracker registered twice");

    let datasourcetracker = Datasourcetracker::new();
    httpd.register_handler(datasourcetracker.clone());
    registry.register_lifetime_global(datasourcetracker.clone());
    registry
        .insert::<DatasourcetrackerKey>(datasourcetracker.clone())
        .expect("datasourcetracker registered twice");

    let sourcetracker = Sourcetracker::new();
    registry.register_lifetime_global(sourcetracker.clone());
    registry
        .insert::<SourcetrackerKey>(sourcetracker.clone())
        .expect("sourcetracker registered twice");
    sourcetracker.set_poll_token(registry.register_pollable_rc(&sourcetracker));
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    // Everything that needs the helper's root rights registers before
    // the sync; the tun/tap device opens right after it.
    if let Some(ref ipc) = root_ipc {
        sourcetracker.register_ipc(ipc);
    }

    let tuntap = DumpfileTuntap::new(&chain);

    if let Some(ref ipc) = root_ipc {
        if ipc.is_running() {
            if let Err(e) = ipc.sync_root().and_then(|_| ipc.sync_ipc()) {
                registry.message(
                    MessageFlags::ERROR,
                    &format!("Unable to sync the capture helper: {}", e),
                );
            }
        }
    }

    if let Err(e) = tuntap.open_tuntap(&registry) {
        registry.message(
            MessageFlags::ERROR,
            &format!("Unable to open tun/tap export: {}", e),
        );
    }
    registry.register_dumpfile(tuntap);

    // The helper may drop privileges now.
    if let Some(ref ipc) = root_ipc {
        if ipc.is_running() {
            if let Err(e) = ipc.send_startup() {
                registry.message(
                    MessageFlags::ERROR,
                    &format!("Unable to authorize the capture helper: {}", e),
                );
            }
        }
    }

    let alertracker = Alertracker::new();
    registry.register_lifetime_global(alertracker.clone());
    registry
        .insert::<AlertrackerKey>(alertracker.clone())
        .expect("alertracker registered twice");
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    registry.message(MessageFlags::INFO, "Creating device tracker...");
    let devicetracker = Devicetracker::new();
    Devicetracker::hook_chain(&devicetracker, &chain);
    registry.register_lifetime_global(devicetracker.clone());
    registry
        .insert::<DevicetrackerKey>(devicetracker.clone())
        .expect("devicetracker registered twice");
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    // Link-type decoders and dissectors.
    PpiDlt::register(&chain);
    RadiotapDlt::register(&chain);
    Prism2Dlt::register(&chain);
    IpdataDissector::register(&chain);

    // Base PHY.
    let (_phy80211, phy_rv) = Phy80211::register(&chain, &devicetracker);
    if phy_rv < 0 || registry.is_fatal_condition() {
        registry.set_fatal_condition();
        return server::spindown(&registry);
    }

    // Packet source types, each gated by its capability flag.
    #[cfg(feature = "use-packetsource-pcapfile")]
    {
        if sourcetracker.register_packet_source(PcapfileSource::SOURCE_TYPE, build_pcapfile) < 0
            || registry.is_fatal_condition()
        {
            registry.set_fatal_condition();
            return server::spindown(&registry);
        }
        datasourcetracker
            .register_datasource_type(PcapfileSource::SOURCE_TYPE, "Replay a pcap capture file");
    }

    // Plugins.
    let mut plugintracker: Option<Rc<Plugintracker>> = None;
    if plugins {
        let tracker = Plugintracker::new();
        registry.register_lifetime_global(tracker.clone());
        registry
            .insert::<PlugintrackerKey>(tracker.clone())
            .expect("plugintracker registered twice");
        tracker.scan_user_plugins(&registry);
        tracker.activate_plugins(&registry);
        if registry.is_fatal_condition() {
            registry.message(MessageFlags::FATAL, "Failure during activating plugins");
            return server::spindown(&registry);
        }
        plugintracker = Some(tracker);
    } else {
        registry.message(
            MessageFlags::INFO,
            "Plugins disabled on the command line, plugins will NOT be loaded...",
        );
    }

    // Enable sources from config and command line.
    if sourcetracker.load_configuration(&registry) < 0 {
        registry.set_fatal_condition();
        return server::spindown(&registry);
    }

    let gps = GpsManager::new(&registry, &config);
    gps.set_poll_token(registry.register_pollable_rc(&gps));
    registry.register_lifetime_global(gps.clone());
    registry
        .insert::<GpsManagerKey>(gps)
        .expect("gps manager registered twice");

    let manuf = Manuf::new(&registry, &config);
    registry.register_lifetime_global(manuf.clone());
    registry
        .insert::<ManufKey>(manuf)
        .expect("manuf registered twice");
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    // Dump files.
    registry.message(MessageFlags::INFO, "Registering dumpfiles...");
    let logtemplate = config
        .fetch_opt("logtemplate")
        .unwrap_or_else(|| DEFAULT_LOGTEMPLATE.to_string());
    let logtypes = config
        .fetch_opt("logtypes")
        .unwrap_or_else(|| DEFAULT_LOGTYPES.to_string());
    for logtype in logtypes.split(',').map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let path = config.expand_log_path(&logtemplate, logtype, &registry);
        match logtype {
            "pcapdump" => {
                let dump = DumpfilePcap::new(path, &chain);
                registry
                    .insert::<PcapDumpKey>(dump.clone())
                    .expect("pcap dump registered twice");
                registry.register_dumpfile(dump);
            }
            "netxml" => registry.register_dumpfile(DumpfileNetxml::new(path)),
            "nettxt" => registry.register_dumpfile(DumpfileNettxt::new(path)),
            "gpsxml" => registry.register_dumpfile(DumpfileGpsxml::new(path)),
            "string" => {
                registry.register_dumpfile(DumpfileStrings::new(path, &chain));
            }
            "alert" => {
                let dump = DumpfileAlert::new(path);
                bus.register_client(dump.clone(), MessageFlags::ALERT);
                registry.register_dumpfile(dump);
            }
            other => {
                registry.message(
                    MessageFlags::ERROR,
                    &format!("Unknown log type '{}', skipping", other),
                );
            }
        }
        if registry.is_fatal_condition() {
            return server::spindown(&registry);
        }
    }

    // Periodic flush of the data files.
    let mut write_interval = 0u32;
    if let Some(parsed) = config.fetch_opt_as::<u32>("writeinterval") {
        match parsed {
            Ok(interval) => write_interval = interval,
            Err(_) => registry.message(
                MessageFlags::ERROR,
                "Failed to parse data write interval from config file",
            ),
        }
    }
    if write_interval != 0 && !dumpfile::install_flush_timer(&registry, write_interval) {
        registry.message(
            MessageFlags::FATAL,
            "Failed to register timer event to sync data files for some reason.",
        );
        registry.set_fatal_condition();
        return server::spindown(&registry);
    }

    // Stateful alerts.
    BssTimestampAlert::register(&chain, &alertracker);
    if registry.is_fatal_condition() {
        return server::spindown(&registry);
    }

    // Last chance for plugins that did not come up the first time.
    if let Some(ref tracker) = plugintracker {
        tracker.last_chance_plugins(&registry);
        if registry.is_fatal_condition() {
            return server::spindown(&registry);
        }
    }

    let systemmonitor = Systemmonitor::new();
    httpd.register_handler(systemmonitor.clone());
    registry.register_lifetime_global(systemmonitor.clone());
    registry
        .insert::<SystemmonitorKey>(systemmonitor)
        .expect("system monitor registered twice");

    // Start listening as the last thing before capture begins.
    if let Err(e) = httpd.start_httpd(&registry) {
        registry.message(MessageFlags::FATAL, &format!("{}", e));
        registry.set_fatal_condition();
        return server::spindown(&registry);
    }

    registry.message(MessageFlags::INFO, "Kismet starting to gather packets");

    sourcetracker.start_source(&registry, 0);
    if sourcetracker.source_count() == 0 {
        registry.message(
            MessageFlags::INFO,
            &format!(
                "No packet sources defined.  You MUST ADD SOME using the Kismet \
                 client, or by placing them in the Kismet config file ({}/{})",
                SYSCONF_LOC, CONFIG_BASE
            ),
        );
    }

    // Now that setup chatter is done, honor the requested silence.
    messagebus::set_silent(local_silent);

    server::run(&registry)
}

fn cli<'a, 'b>() -> App<'a, 'b> {
    App::new("kismet_server")
        .about(
            "Kismet wireless monitoring server.  Nearly all of these options are \
             run-time overrides for values in the kismet.conf configuration file; \
             permanent changes should be made to the configuration file.",
        ).setting(AppSettings::DisableVersion)
        .setting(AppSettings::AllowLeadingHyphen)
        .arg(
            Arg::with_name("VERSION")
                .short("v")
                .long("version")
                .help("Show version"),
        ).arg(
            Arg::with_name("CONFIG_FILE")
                .short("f")
                .long("config-file")
                .takes_value(true)
                .help("Use alternate configuration file"),
        ).arg(
            Arg::with_name("NO_LINE_WRAP")
                .long("no-line-wrap")
                .help("Turn off linewrapping of output (for grep, speed, etc)"),
        ).arg(
            Arg::with_name("SILENT")
                .short("s")
                .long("silent")
                .help("Turn off stdout output after setup phase"),
        ).arg(
            Arg::with_name("DAEMONIZE")
                .long("daemonize")
                .help("Spawn detached in the background"),
        ).arg(
            Arg::with_name("NO_PLUGINS")
                .long("no-plugins")
                .help("Do not load plugins"),
        ).arg(
            Arg::with_name("NO_ROOT")
                .long("no-root")
                .help("Do not launch the kismet_capture control binary"),
        ).arg(
            Arg::with_name("HOMEDIR")
                .long("homedir")
                .takes_value(true)
                .help("Use an alternate path as the home directory instead of the user entry"),
        ).arg(
            Arg::with_name("NO_NCURSES_WRAPPER")
                .long("no-ncurses-wrapper")
                .help("Disable the console wrapper"),
        ).arg(
            Arg::with_name("DEBUG")
                .long("debug")
                .help("Disable the console wrapper and the crash handling functions, for debugging"),
        ).arg(
            Arg::with_name("CAPTURE_SOURCE")
                .short("c")
                .long("capture-source")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Add a packet capture source"),
        ).arg(
            Arg::with_name("SUBOPTS")
                .multiple(true)
                .hidden(true),
        )
}

/// Core usage text plus every subsystem's registered contribution,
/// then exit 1 (handled by the caller).
fn usage(registry: &GlobalRegistry, clap_help: &str) {
    println!("{}", clap_help);
    println!();
    for func in registry.usage_funcs() {
        func();
    }
}

fn hostname() -> Option<String> {
    let mut buf = [0 as libc::c_char; 64];
    let rv = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) };
    if rv != 0 {
        return None;
    }
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_str()
        .ok()
        .map(|s| s.to_string())
}

/// The pid file is advisory; failure to write it is reported but does
/// not stop startup.
fn write_pid_file(registry: &GlobalRegistry, config: &ConfigFile) {
    let piddir = config
        .fetch_opt("piddir")
        .unwrap_or_else(|| "/var/run".to_string());
    let path = PathBuf::from(piddir).join(PID_BASE);
    match File::create(&path) {
        Ok(mut file) => {
            if write!(file, "{}", kismet_core::os::process::current_pid()).is_ok() {
                registry.set_pid_file(path);
            }
        }
        Err(e) => {
            debug!("Unable to write pid file {}: {}", path.display(), e);
            registry.message(
                MessageFlags::ERROR,
                &format!("Unable to write pid file {}: {}", path.display(), e),
            );
        }
    }
}

#[cfg(feature = "use-packetsource-pcapfile")]
fn build_pcapfile(def: SourceDefinition) -> Rc<dyn PacketSource> {
    PcapfileSource::new(def)
}
