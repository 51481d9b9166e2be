//! Bootstrap document templates — preamble and postamble.
//!
//! Two immutable text blocks wrapping the per-recipe stanzas, plus the five
//! placeholder tokens recognized everywhere. The preamble installs the store
//! client, reports a `start` status, and arms an error trap that uploads the
//! accumulated log and reports `failed`; the postamble reports `over` and
//! uploads the final log.

/// Application/run identifier.
pub const TOKEN_ID: &str = "${SEM_ID}";
/// Deployment store endpoint address.
pub const TOKEN_URL: &str = "${SEM_URL}";
/// Deployment bearer token.
pub const TOKEN_TOKEN: &str = "${SEM_TOKEN}";
/// Deployment identifier.
pub const TOKEN_DEP: &str = "${SEM_DEP}";
/// Run name.
pub const TOKEN_NAME: &str = "${SEM_NAME}";

pub const PREAMBLE: &str = r#"#!/bin/bash
set -e

export TOKEN="${SEM_TOKEN}"

ON_ERROR () {
    trap ERR
    if [ -e /opt/semilla/${SEM_ID}.log ]; then
        /opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put _log_app_${SEM_NAME}_${HOSTNAME} @/opt/semilla/${SEM_ID}.log
    fi
    /opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put status_app_${SEM_NAME}_${HOSTNAME} failed
    exit 1
}

trap ON_ERROR ERR

echo "Set up semilla"

if [ -n "$(command -v yum)" ]; then
    yum -y install curl dos2unix
fi

if [ -n "$(command -v apt)" ]; then
    export DEBIAN_NONINTERACTIVE=1
    systemctl stop apt-daily.timer || true
    systemctl disable apt-daily.timer || true
    systemctl mask apt-daily.service || true
    systemctl daemon-reload
    apt-get purge -y unattended-upgrades || true
    time (while ps -opid= -C apt-get > /dev/null; do sleep 1; done); echo "Waiting for apt unlock"
    apt-get update && apt-get install -y curl dos2unix
fi

get_latest_release() {
    curl --silent "https://api.github.com/repos/paiml/semilla/releases/latest" |
      grep '"tag_name":' |
      sed -E 's/.*"([^"]+)".*/\1/'
}
cliversion=`get_latest_release`

send_start_ts() {
    cur=`date +%s`
    /opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put _ts_start_${SEM_NAME}_${HOSTNAME} $cur
}

send_end_ts() {
    cur=`date +%s`
    /opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put _ts_end_${SEM_NAME}_${HOSTNAME} $cur
}

echo "[INFO] initialization"

mkdir -p /opt/semilla
curl -L -o /opt/semilla/semilla-cli https://github.com/paiml/semilla/releases/download/$cliversion/semilla-cli.linux.amd64
chmod +x /opt/semilla/semilla-cli
send_start_ts

/opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put status_app_${SEM_NAME}_${HOSTNAME} start
"#;

pub const POSTAMBLE: &str = r#"
echo "[INFO] setup is over"
send_end_ts
/opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put status_app_${SEM_NAME}_${HOSTNAME} over
if [ -e /opt/semilla/${SEM_ID}.log ]; then
    /opt/semilla/semilla-cli --deployment ${SEM_DEP} --url ${SEM_URL} --token $TOKEN put _log_app_${SEM_NAME}_${HOSTNAME} @/opt/semilla/${SEM_ID}.log
fi
"#;
