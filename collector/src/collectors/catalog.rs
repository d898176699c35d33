//! Built-in metric names per service, used when a service is enabled without
//! an explicit metric list.

use alicloud_exporter_config::ServiceKind;

pub const SLB_METRICS: &[&str] = &[
    "ActiveConnection",
    "NewConnection",
    "DropConnection",
    "InactiveConnection",
    "MaxConnection",
    "Qps",
    "Rt",
    "StatusCode2xx",
    "StatusCode3xx",
    "StatusCode4xx",
    "StatusCode5xx",
    "StatusCodeOther",
    "TrafficRXNew",
    "TrafficTXNew",
    "HeathyServerCount",
    "UnhealthyServerCount",
    "DropPackerRX",
    "DropPackerTX",
    "DropTrafficRX",
    "DropTrafficTX",
    "PacketRX",
    "PacketTX",
    "UpstreamCode4xx",
    "UpstreamCode5xx",
    "UpstreamRt",
    "InstanceActiveConnection",
    "InstanceDropConnection",
    "InstanceDropPacketRX",
    "InstanceDropPacketTX",
    "InstanceDropTrafficRX",
    "InstanceDropTrafficTX",
    "InstanceInactiveConnection",
    "InstanceMaxConnection",
    "InstanceMaxConnectionUtilization",
    "InstanceNewConnection",
    "InstanceNewConnectionUtilization",
    "InstancePacketRX",
    "InstancePacketTX",
    "InstanceQps",
    "InstanceQpsUtilization",
    "InstanceRt",
    "InstanceStatusCode2xx",
    "InstanceStatusCode3xx",
    "InstanceStatusCode4xx",
    "InstanceStatusCode5xx",
    "InstanceStatusCodeOther",
    "InstanceTrafficRX",
    "InstanceTrafficTX",
    "InstanceUpstreamCode4xx",
    "InstanceUpstreamCode5xx",
    "InstanceUpstreamRt",
    "GroupTotalTrafficRX",
    "GroupTotalTrafficTX",
];

pub const REDIS_METRICS: &[&str] = &[
    "ConnectionUsage",
    "CpuUsage",
    "MemoryUsage",
    "UsedMemory",
    "UsedConnection",
    "UsedQPS",
    "IntranetIn",
    "IntranetOut",
    "IntranetInRatio",
    "IntranetOutRatio",
    "FailedCount",
    "AvgRt",
    "MaxRt",
    "ExpiredKeys",
    "EvictedKeys",
    "HitRate",
    "Keys",
    "Expires",
    "ConnectedClients",
    "BlockedClients",
    "TotalCommandsProcessed",
    "InstantaneousOpsPerSec",
    "KeyspaceHits",
    "KeyspaceMisses",
    "PubsubChannels",
    "PubsubPatterns",
    "LatestForkUsec",
    "RdbChangesSinceLastSave",
    "SyncFull",
    "SyncPartialErr",
    "SyncPartialOk",
    "RejectedConnections",
    "SlowLogLen",
];

pub const RDS_METRICS: &[&str] = &[
    "ConnectionUsage",
    "CpuUsage",
    "DiskUsage",
    "IOPSUsage",
    "MemoryUsage",
    "MySQL_ActiveSessions",
    "MySQL_QPS",
    "MySQL_TPS",
    "MySQL_NetworkInNew",
    "MySQL_NetworkOutNew",
    "MySQL_IbufDirtyRatio",
    "MySQL_IbufUseRatio",
    "MySQL_InnoDBDataRead",
    "MySQL_InnoDBDataWritten",
    "MySQL_ComDelete",
    "MySQL_ComInsert",
    "MySQL_ComInsertSelect",
    "MySQL_ComReplace",
    "MySQL_ComReplaceSelect",
    "MySQL_ComSelect",
    "MySQL_ComUpdate",
    "MySQL_TempDiskTableCreates",
    "MySQL_InnoDBRowUpdate",
    "MySQL_InnoDBRowInsert",
    "MySQL_InnoDBRowDelete",
    "MySQL_InnoDBRowRead",
    "MySQL_InnoDBLogFsync",
    "MySQL_InnoDBLogWrites",
    "MySQL_InnoDBLogWriteRequests",
    "MySQL_SlowQueries",
    "MySQL_ThreadsConnected",
    "MySQL_ThreadsRunning",
    "MySQL_CreatedTmpDiskTables",
    "MySQL_CreatedTmpTables",
    "MySQL_OpenTables",
    "MySQL_TableLocksWaited",
    "MySQL_TableLocksImmediate",
    "MySQL_InnoDBBufferPoolReads",
    "MySQL_InnoDBBufferPoolReadRequests",
    "MySQL_InnoDBBufferPoolUtilization",
    "MySQL_InnoDBDataReads",
    "MySQL_InnoDBDataWrites",
    "MySQL_InnoDBOsLogFsyncs",
    "MySQL_InnoDBOsLogWrites",
    "MySQL_InnoDBLogWaits",
    "MySQL_BinlogDiskUsage",
    "MySQL_RelayLogDiskUsage",
    "MySQL_TmpDiskUsage",
    "MySQL_DataDiskUsage",
    "MySQL_LogDiskUsage",
    "MySQL_OtherDiskUsage",
    "MySQL_SlaveIORunning",
    "MySQL_SlaveSQLRunning",
    "MySQL_SecondsBehindMaster",
    "MySQL_MasterBinlogSize",
    "MySQL_SlaveBinlogSize",
];

pub fn metrics(kind: ServiceKind) -> &'static [&'static str] {
    match kind {
        ServiceKind::Slb => slb(),
        ServiceKind::Redis => redis(),
        ServiceKind::Rds => rds(),
    }
}

pub fn slb() -> &'static [&'static str] {
    SLB_METRICS
}

pub fn redis() -> &'static [&'static str] {
    REDIS_METRICS
}

pub fn rds() -> &'static [&'static str] {
    RDS_METRICS
}
