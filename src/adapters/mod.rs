//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                  |
//! |-------------|--------------------|------------------------------|
//! | `hardware`  | InputPort          | ESP32 GPIO (button, jumper)  |
//! |             | ActuatorPort       | ESP32 GPIO (relay, LED, rail)|
//! |             | TransducerPort     | DS18B20 on 1-Wire            |
//! | `log_sink`  | EventSink          | Serial log output            |
//! | `mqtt`      | BusPort            | ESP-MQTT client over WiFi    |
//! | `nvs`       | ConfigPort         | NVS / in-memory store        |
//! | `ota`       | UpdatePort         | esp-ota image confirmation   |
//! | `power`     | PowerPort          | Deep sleep, restart          |
//! | `time`      | ClockPort          | ESP32 system timer           |
//! | `wifi`      | (used by `mqtt`)   | ESP-IDF WiFi STA             |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod ota;
pub mod power;
pub mod time;
pub mod wifi;
