//! Text of the generated reverse-proxy and supervisor configuration.
//!
//! Every instance of an application gets one proxy config and one
//! supervisor program, both named `<app>_<port>.conf` so removal can find
//! them by name alone.

use std::path::PathBuf;

use crate::common::config::{PathsConfig, RuntimeConfig};

pub fn instance_name(app: &str, port: u16) -> String {
    format!("{}_{}", app, port)
}

pub fn conf_file_name(app: &str, port: u16) -> String {
    format!("{}.conf", instance_name(app, port))
}

/// Port of a generated config file belonging to `app`, if `file_name` is one.
pub fn conf_file_port(app: &str, file_name: &str) -> Option<u16> {
    file_name
        .strip_prefix(app)?
        .strip_prefix('_')?
        .strip_suffix(".conf")?
        .parse()
        .ok()
}

/// Whether `file_name` is a log file written for one of `app`'s instances.
pub fn is_instance_log(app: &str, file_name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(app).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && (rest[digits..].starts_with('.') || rest[digits..].starts_with('-'))
}

/// Paths derived for one `(application, port)` instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceLayout {
    pub app: String,
    pub port: u16,
    pub name: String,
    pub app_dir: PathBuf,
    pub env_dir: PathBuf,
    pub state_dir: PathBuf,
    pub socket: PathBuf,
    pub proxy_conf: PathBuf,
    pub proxy_pid: PathBuf,
    pub supervisor_conf: PathBuf,
    pub access_log: PathBuf,
    pub error_log: PathBuf,
    pub app_log: PathBuf,
    pub proxy_support_dir: PathBuf,
}

impl InstanceLayout {
    pub fn new(paths: &PathsConfig, app: &str, port: u16) -> Self {
        let name = instance_name(app, port);
        let state_dir = paths.app_state_dir(app);
        let log_dir = paths.log_dir();
        Self {
            app: app.to_string(),
            port,
            app_dir: paths.app_dir(app),
            env_dir: paths.app_env_dir(app),
            socket: state_dir.join(format!("{}.sock", name)),
            proxy_pid: state_dir.join(format!("{}-proxy.pid", name)),
            state_dir,
            proxy_conf: paths.proxy_conf_dir().join(conf_file_name(app, port)),
            supervisor_conf: paths.supervisor_conf_dir().join(conf_file_name(app, port)),
            access_log: log_dir.join(format!("{}-access.log", name)),
            error_log: log_dir.join(format!("{}-error.log", name)),
            app_log: log_dir.join(format!("{}.log", name)),
            proxy_support_dir: paths.proxy_conf_dir(),
            name,
        }
    }
}

pub fn render_proxy_conf(layout: &InstanceLayout) -> String {
    format!(
        r#"# {name}
worker_processes 1;
pid {pid};
error_log {error_log};

events {{
    worker_connections 1024;
}}

http {{
    include {support}/mime.types;
    default_type application/octet-stream;
    access_log {access_log};
    sendfile on;
    keepalive_timeout 65;

    server {{
        listen {port};

        location / {{
            include {support}/uwsgi_params;
            uwsgi_pass unix://{socket};
        }}

        location /nginx_status {{
            stub_status on;
            access_log off;
            allow 127.0.0.1;
            deny all;
        }}
    }}
}}
"#,
        name = layout.name,
        pid = layout.proxy_pid.display(),
        error_log = layout.error_log.display(),
        support = layout.proxy_support_dir.display(),
        access_log = layout.access_log.display(),
        port = layout.port,
        socket = layout.socket.display(),
    )
}

pub fn render_supervisor_conf(
    layout: &InstanceLayout,
    runtime: &RuntimeConfig,
    extra_args: &[String],
) -> String {
    let mut command = vec![
        runtime.uwsgi_bin.clone(),
        "--socket".to_string(),
        layout.socket.display().to_string(),
        "--chdir".to_string(),
        layout.app_dir.display().to_string(),
        "--home".to_string(),
        layout.env_dir.display().to_string(),
        "--master".to_string(),
        "--processes".to_string(),
        "1".to_string(),
        "--max-requests".to_string(),
        runtime.max_requests.to_string(),
        "--harakiri".to_string(),
        runtime.harakiri_secs.to_string(),
        "--chmod-socket=666".to_string(),
        "--module".to_string(),
        "wsgi".to_string(),
    ];
    command.extend(runtime.extra_args.iter().cloned());
    command.extend(extra_args.iter().cloned());
    format!(
        r#"[program:{name}]
command={command}
directory={app_dir}
user={user}
autostart=true
autorestart=true
stopsignal=QUIT
redirect_stderr=true
stdout_logfile={app_log}
"#,
        name = layout.name,
        command = command.join(" "),
        app_dir = layout.app_dir.display(),
        user = runtime.user,
        app_log = layout.app_log.display(),
    )
}

/// Master supervisord config including every generated program file.
pub fn render_supervisord_conf(app_name: &str, paths: &PathsConfig) -> String {
    let conf_dir = paths.supervisor_conf_dir();
    let socket = conf_dir.join("supervisor.sock");
    format!(
        r#"; {app_name} supervisor config

[unix_http_server]
file={socket}

[supervisord]
childlogdir={log_dir}
logfile={logfile}
logfile_maxbytes=50MB
logfile_backups=5
loglevel=info
pidfile={pidfile}
nodaemon=false

[rpcinterface:supervisor]
supervisor.rpcinterface_factory = supervisor.rpcinterface:make_main_rpcinterface

[supervisorctl]
serverurl=unix://{socket}

[include]
files = {conf_dir}/*.conf
"#,
        app_name = app_name,
        socket = socket.display(),
        log_dir = paths.log_dir().display(),
        logfile = conf_dir.join("supervisord.log").display(),
        pidfile = conf_dir.join("supervisord.pid").display(),
        conf_dir = conf_dir.display(),
    )
}

pub const UWSGI_PARAMS: &str = "uwsgi_param  QUERY_STRING       $query_string;
uwsgi_param  REQUEST_METHOD     $request_method;
uwsgi_param  CONTENT_TYPE       $content_type;
uwsgi_param  CONTENT_LENGTH     $content_length;
uwsgi_param  REQUEST_URI        $request_uri;
uwsgi_param  PATH_INFO          $document_uri;
uwsgi_param  DOCUMENT_ROOT      $document_root;
uwsgi_param  SERVER_PROTOCOL    $server_protocol;
uwsgi_param  REMOTE_ADDR        $remote_addr;
uwsgi_param  REMOTE_PORT        $remote_port;
uwsgi_param  SERVER_ADDR        $server_addr;
uwsgi_param  SERVER_PORT        $server_port;
uwsgi_param  SERVER_NAME        $server_name;
";

pub const MIME_TYPES: &str = "types {
    text/html                             html htm shtml;
    text/css                              css;
    text/xml                              xml;
    text/plain                            txt;
    image/gif                             gif;
    image/jpeg                            jpeg jpg;
    image/png                             png;
    image/svg+xml                         svg svgz;
    image/x-icon                          ico;
    application/javascript                js;
    application/json                      json;
    application/pdf                       pdf;
    application/zip                       zip;
    application/octet-stream              bin exe dll;
    font/woff                             woff;
    font/woff2                            woff2;
}
";
